//! Library crate for lan-probe-rs: multi-method host discovery.
pub mod config;
pub mod host;
pub mod logging;
pub mod ports;
pub mod probe;
pub mod scanner;
pub mod sink;
pub mod targets;
pub mod types;
