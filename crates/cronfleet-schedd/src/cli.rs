use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cronfleet_core::SchedulerConfig;
use cronfleet_rpc::{PoolConfig, TlsFiles};

#[derive(Parser, Debug)]
#[command(
    name = "cronfleet-schedd",
    version,
    about = "Cron scheduler dispatching HTTP and remote shell jobs",
    long_about = None
)]
pub struct SchedArgs {
    /// JSON file holding the task list. Without it the scheduler starts empty.
    #[arg(short, long, env = "CRONFLEET_TASKS")]
    pub tasks: Option<PathBuf>,

    /// Operator HTTP endpoint (health, metrics, manual run, stop, tail, logs).
    #[arg(long, env = "CRONFLEET_HTTP_LISTEN", default_value = "127.0.0.1:5920")]
    pub http_listen: SocketAddr,

    /// Maximum number of run bodies executing at once.
    #[arg(short = 'j', long, default_value_t = 500)]
    pub concurrency: usize,

    /// Daily log-cleanup time, `HH:MM`.
    #[arg(long, default_value = "03:00")]
    pub log_cleanup_time: String,

    /// Days of run logs to keep; 0 keeps everything.
    #[arg(long, default_value_t = 0)]
    pub log_retention_days: u32,

    #[arg(long, default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// CA bundle used to verify agents. Setting it together with --tls-cert and --tls-key
    /// enables mutual TLS towards every agent.
    #[arg(long, env = "CRONFLEET_TLS_CA", requires_all = ["tls_cert", "tls_key"])]
    pub tls_ca: Option<PathBuf>,

    #[arg(long, env = "CRONFLEET_TLS_CERT", requires_all = ["tls_ca", "tls_key"])]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "CRONFLEET_TLS_KEY", requires_all = ["tls_ca", "tls_cert"])]
    pub tls_key: Option<PathBuf>,

    /// Server name checked against agent certificates.
    #[arg(long, env = "CRONFLEET_TLS_DOMAIN")]
    pub tls_domain: Option<String>,

    /// text | json | journald
    #[arg(long, env = "CRONFLEET_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[arg(long, env = "CRONFLEET_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl SchedArgs {
    pub fn pool_config(&self) -> PoolConfig {
        let tls = match (&self.tls_ca, &self.tls_cert, &self.tls_key) {
            (Some(ca), Some(cert), Some(key)) => Some(TlsFiles {
                ca_file: ca.clone(),
                cert_file: cert.clone(),
                key_file: key.clone(),
            }),
            _ => None,
        };
        PoolConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            tls,
            tls_domain: self.tls_domain.clone(),
            ..PoolConfig::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            concurrency: self.concurrency,
            ..SchedulerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = SchedArgs::try_parse_from(["cronfleet-schedd"]).unwrap();
        assert!(args.tasks.is_none());
        assert_eq!(args.http_listen.port(), 5920);
        assert_eq!(args.scheduler_config().concurrency, 500);
        assert_eq!(args.log_cleanup_time, "03:00");

        let pool = args.pool_config();
        assert_eq!(pool.connect_timeout, Duration::from_secs(5));
        assert!(pool.tls.is_none());
    }

    #[test]
    fn flags_override() {
        let args = SchedArgs::try_parse_from([
            "cronfleet-schedd",
            "-t",
            "tasks.json",
            "-j",
            "8",
            "--log-retention-days",
            "30",
            "--tls-domain",
            "agents.internal",
        ])
        .unwrap();
        assert_eq!(args.tasks, Some(PathBuf::from("tasks.json")));
        assert_eq!(args.scheduler_config().concurrency, 8);
        assert_eq!(args.log_retention_days, 30);
        assert_eq!(args.pool_config().tls_domain.as_deref(), Some("agents.internal"));
    }
}
