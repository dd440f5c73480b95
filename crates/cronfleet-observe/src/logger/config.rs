use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable whose filter directives override [`LoggerConfig::level`].
pub const LOG_ENV: &str = "CRONFLEET_LOG";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `info` or `warn,cronfleet_core=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || atty::is(atty::Stream::Stdout);
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Parses `format` and `level` as given on a command line.
    pub fn from_args(format: &str, level: &str) -> Result<Self, LoggerError> {
        let cfg = Self {
            format: format.parse()?,
            level: level.to_string(),
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), LoggerError> {
        tracing_subscriber::EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|_| LoggerError::InvalidLogLevel(self.level.clone()))
    }
}
