use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cronfleet_rpc::{ServerConfig, TlsFiles};

#[derive(Parser, Debug)]
#[command(
    name = "cronfleet-agentd",
    version,
    about = "Worker agent: runs shell commands for the cronfleet scheduler",
    long_about = None
)]
pub struct AgentArgs {
    /// Address the RPC listener binds to.
    #[arg(short, long, env = "CRONFLEET_AGENT_LISTEN", default_value = "0.0.0.0:5921")]
    pub listen: SocketAddr,

    /// CA bundle used to verify scheduler client certificates.
    /// Setting it together with --tls-cert and --tls-key enables mutual TLS.
    #[arg(long, env = "CRONFLEET_TLS_CA", requires_all = ["tls_cert", "tls_key"])]
    pub tls_ca: Option<PathBuf>,

    #[arg(long, env = "CRONFLEET_TLS_CERT", requires_all = ["tls_ca", "tls_key"])]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "CRONFLEET_TLS_KEY", requires_all = ["tls_ca", "tls_cert"])]
    pub tls_key: Option<PathBuf>,

    /// Seconds a finished run's output stays fetchable by tail requests.
    #[arg(long, default_value_t = 5)]
    pub output_retention_secs: u64,

    /// text | json | journald
    #[arg(long, env = "CRONFLEET_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[arg(long, env = "CRONFLEET_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl AgentArgs {
    pub fn server_config(&self) -> ServerConfig {
        let tls = match (&self.tls_ca, &self.tls_cert, &self.tls_key) {
            (Some(ca), Some(cert), Some(key)) => Some(TlsFiles {
                ca_file: ca.clone(),
                cert_file: cert.clone(),
                key_file: key.clone(),
            }),
            _ => None,
        };
        ServerConfig {
            addr: self.listen,
            tls,
            output_retention: Duration::from_secs(self.output_retention_secs),
            ..ServerConfig::default()
        }
    }
}
