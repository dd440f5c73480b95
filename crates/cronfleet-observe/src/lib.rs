//! Process-wide logging setup shared by the `cronfleet` binaries.
//!
//! ```no_run
//! use cronfleet_observe::{LoggerConfig, LoggerFormat, logger_init};
//!
//! let cfg = LoggerConfig {
//!     format: LoggerFormat::Json,
//!     level: "info,cronfleet_rpc=debug".into(),
//!     ..LoggerConfig::default()
//! };
//! logger_init(&cfg).expect("logger");
//! ```
mod logger;
pub use logger::*;
