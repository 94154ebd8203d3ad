//! Load generation for exercising a running intake server.

use std::net::SocketAddr;
use std::time;

use envconfig::Envconfig;
use rand::Rng;

use crate::config::NonZeroMsDuration;
use crate::record::{Number, MAX_ALLOWED_NUMBER};

#[derive(Envconfig, Clone, Debug)]
pub struct ClientConfig {
    #[envconfig(default = "127.0.0.1:4000")]
    pub server_address: SocketAddr,

    #[envconfig(default = "5")]
    pub numbers_per_package: usize,

    /// Stop after this many packages; run until the server hangs up otherwise.
    pub max_packages: Option<u64>,

    #[envconfig(default = "1000")]
    pub progress_interval_ms: NonZeroMsDuration,
}

impl ClientConfig {
    pub fn progress_interval(&self) -> time::Duration {
        self.progress_interval_ms.get()
    }
}

pub fn random_number<R: Rng + ?Sized>(rng: &mut R) -> Number {
    let value = rng.gen_range(1..MAX_ALLOWED_NUMBER);
    Number::try_from(value).expect("generated value is within the accepted range")
}

/// One write worth of newline terminated random numbers.
pub fn random_package<R: Rng + ?Sized>(rng: &mut R, numbers: usize) -> String {
    let mut package = String::with_capacity(numbers * 10);
    for _ in 0..numbers {
        package.push_str(&random_number(rng).to_string());
        package.push('\n');
    }
    package
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::record::{validate, Record};

    #[test]
    fn packages_contain_only_valid_lines() {
        let mut rng = StdRng::seed_from_u64(42);
        let package = random_package(&mut rng, 500);

        assert!(package.ends_with('\n'));
        let lines: Vec<&str> = package.lines().collect();
        assert_eq!(lines.len(), 500);
        for line in lines {
            assert!(
                matches!(validate(line), Ok(Record::Number(_))),
                "generated invalid line {line:?}"
            );
        }
    }

    #[test]
    fn empty_package() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_package(&mut rng, 0), "");
    }

    #[test]
    fn zero_progress_interval_is_rejected() {
        let vars = HashMap::from([("PROGRESS_INTERVAL_MS".to_owned(), "0".to_owned())]);
        assert!(ClientConfig::init_from_hashmap(&vars).is_err());

        let config = ClientConfig::init_from_hashmap(&HashMap::new()).expect("defaults are valid");
        assert_eq!(config.progress_interval(), time::Duration::from_secs(1));
    }
}
