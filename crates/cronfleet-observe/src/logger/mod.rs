mod config;
mod error;
mod format;
mod log;

pub use config::{LOG_ENV, LoggerConfig};
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Installs the global subscriber described by `cfg`.
///
/// When [`LOG_ENV`] is set it overrides `cfg.level`.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg),
        LoggerFormat::Json => log::Logger::json(cfg),
        LoggerFormat::Journald => log::Logger::journald(cfg),
    }
}
