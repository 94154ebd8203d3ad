pub mod admission;
pub mod buffer;
pub mod client;
pub mod config;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod listener;
pub mod persist;
pub mod prometheus;
pub mod record;
pub mod reporter;
pub mod server;
pub mod shutdown;
pub mod tally;
