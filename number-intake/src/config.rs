use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use thiserror::Error;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:4000")]
    pub address: SocketAddr,

    #[envconfig(default = "./numbers.log")]
    pub output_path: PathBuf,

    #[envconfig(default = "5")]
    pub max_clients: NonZeroUsize,

    #[envconfig(default = "10000")]
    pub report_interval_ms: NonZeroMsDuration,

    #[envconfig(default = "10000")]
    pub filter_capacity: usize,

    #[envconfig(default = "0.01")]
    pub filter_false_positive_rate: f64,

    #[envconfig(default = "1024")]
    pub ingest_queue_capacity: usize,

    #[envconfig(default = "500")]
    pub shutdown_grace_ms: EnvMsDuration,

    /// Serve `/metrics` and `/_liveness` on this address when set.
    pub metrics_address: Option<SocketAddr>,
}

impl Config {
    pub fn report_interval(&self) -> time::Duration {
        self.report_interval_ms.get()
    }

    pub fn shutdown_grace(&self) -> time::Duration {
        self.shutdown_grace_ms.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseEnvMsDurationError {
    #[error("expected a duration in whole milliseconds")]
    NotMilliseconds,
    #[error("duration must be at least one millisecond")]
    Zero,
}

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s
            .parse::<u64>()
            .map_err(|_| ParseEnvMsDurationError::NotMilliseconds)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// A period for timers, which cannot tick every zero milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonZeroMsDuration(time::Duration);

impl NonZeroMsDuration {
    pub fn new(duration: time::Duration) -> Option<Self> {
        (!duration.is_zero()).then_some(NonZeroMsDuration(duration))
    }

    pub fn get(&self) -> time::Duration {
        self.0
    }
}

impl FromStr for NonZeroMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let EnvMsDuration(duration) = s.parse()?;
        NonZeroMsDuration::new(duration).ok_or(ParseEnvMsDurationError::Zero)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_reference_workload() {
        let config = Config::init_from_hashmap(&HashMap::new()).expect("defaults are valid");

        assert_eq!(config.address, "0.0.0.0:4000".parse().unwrap());
        assert_eq!(config.output_path, PathBuf::from("./numbers.log"));
        assert_eq!(config.max_clients.get(), 5);
        assert_eq!(config.report_interval(), time::Duration::from_secs(10));
        assert_eq!(config.filter_capacity, 10000);
        assert_eq!(config.filter_false_positive_rate, 0.01);
        assert_eq!(config.shutdown_grace(), time::Duration::from_millis(500));
        assert!(config.metrics_address.is_none());
    }

    #[test]
    fn overrides_from_environment() {
        let vars = HashMap::from([
            ("ADDRESS".to_owned(), "127.0.0.1:4100".to_owned()),
            ("MAX_CLIENTS".to_owned(), "2".to_owned()),
            ("REPORT_INTERVAL_MS".to_owned(), "250".to_owned()),
            ("METRICS_ADDRESS".to_owned(), "127.0.0.1:9100".to_owned()),
        ]);
        let config = Config::init_from_hashmap(&vars).expect("overrides are valid");

        assert_eq!(config.address.port(), 4100);
        assert_eq!(config.max_clients.get(), 2);
        assert_eq!(config.report_interval(), time::Duration::from_millis(250));
        assert_eq!(config.metrics_address, Some("127.0.0.1:9100".parse().unwrap()));
    }

    #[test]
    fn ms_duration_rejects_garbage() {
        assert_eq!(
            "10s".parse::<EnvMsDuration>(),
            Err(ParseEnvMsDurationError::NotMilliseconds)
        );
        assert_eq!(
            "42".parse::<EnvMsDuration>(),
            Ok(EnvMsDuration(time::Duration::from_millis(42)))
        );
        assert_eq!(
            "0".parse::<EnvMsDuration>(),
            Ok(EnvMsDuration(time::Duration::ZERO))
        );
    }

    #[test]
    fn timer_periods_must_be_positive() {
        assert_eq!(
            "0".parse::<NonZeroMsDuration>(),
            Err(ParseEnvMsDurationError::Zero)
        );
        assert_eq!(NonZeroMsDuration::new(time::Duration::ZERO), None);
        assert_eq!(
            "1".parse::<NonZeroMsDuration>().map(|d| d.get()),
            Ok(time::Duration::from_millis(1))
        );
    }

    #[test]
    fn zero_report_interval_is_rejected() {
        let vars = HashMap::from([("REPORT_INTERVAL_MS".to_owned(), "0".to_owned())]);
        assert!(Config::init_from_hashmap(&vars).is_err());
    }

    #[test]
    fn zero_max_clients_is_rejected() {
        let vars = HashMap::from([("MAX_CLIENTS".to_owned(), "0".to_owned())]);
        assert!(Config::init_from_hashmap(&vars).is_err());
    }

    #[test]
    fn zero_shutdown_grace_is_allowed() {
        let vars = HashMap::from([("SHUTDOWN_GRACE_MS".to_owned(), "0".to_owned())]);
        let config = Config::init_from_hashmap(&vars).expect("zero grace is valid");
        assert_eq!(config.shutdown_grace(), time::Duration::ZERO);
    }
}
