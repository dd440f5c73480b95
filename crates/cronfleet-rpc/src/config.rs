use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// PEM file set for mutual TLS.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub ca_file: PathBuf,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Keep-alive tuning for long-lived pooled connections.
#[derive(Debug, Clone, Copy)]
pub struct KeepAlive {
    pub tcp: Duration,
    pub http2_interval: Duration,
    pub http2_timeout: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            tcp: Duration::from_secs(30),
            http2_interval: Duration::from_secs(30),
            http2_timeout: Duration::from_secs(3),
        }
    }
}

/// Agent listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub tls: Option<TlsFiles>,
    /// How long a finished run's output stays available to `__TAIL__`.
    pub output_retention: Duration,
    pub keepalive: KeepAlive,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5921)),
            tls: None,
            output_retention: Duration::from_secs(5),
            keepalive: KeepAlive::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.keepalive.http2_timeout.is_zero() {
            return Err("keepalive.http2_timeout must be > 0".into());
        }
        if let Some(tls) = &self.tls {
            validate_tls(tls)?;
        }
        Ok(())
    }
}

/// Client-side connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub connect_timeout: Duration,
    pub tls: Option<TlsFiles>,
    /// Server name to verify against; defaults to the dialed host.
    pub tls_domain: Option<String>,
    pub keepalive: KeepAlive,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            tls: None,
            tls_domain: None,
            keepalive: KeepAlive::default(),
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("connect_timeout must be > 0".into());
        }
        if let Some(tls) = &self.tls {
            validate_tls(tls)?;
        }
        Ok(())
    }
}

fn validate_tls(tls: &TlsFiles) -> Result<(), String> {
    for (name, path) in [
        ("ca_file", &tls.ca_file),
        ("cert_file", &tls.cert_file),
        ("key_file", &tls.key_file),
    ] {
        if path.as_os_str().is_empty() {
            return Err(format!("tls.{name} is empty"));
        }
    }
    Ok(())
}
