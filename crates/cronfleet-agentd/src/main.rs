use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::info;

use cronfleet_observe::{LoggerConfig, logger_init};
use cronfleet_rpc::{AgentService, serve};

mod cli;
use cli::AgentArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = AgentArgs::parse();

    // 1) Logger
    let log_cfg = LoggerConfig::from_args(&args.log_format, &args.log_level)?;
    logger_init(&log_cfg)?;

    // 2) Listener config
    let cfg = args.server_config();
    cfg.validate().map_err(|e| anyhow!("invalid server config: {e}"))?;

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(
        host = %host,
        addr = %cfg.addr,
        tls = cfg.tls.is_some(),
        retention_secs = cfg.output_retention.as_secs(),
        "agent starting"
    );

    // 3) Serve until SIGINT/SIGTERM
    let service = AgentService::new(cfg.output_retention);
    serve(&cfg, service)
        .await
        .with_context(|| format!("agent listener on {}", cfg.addr))?;

    info!("agent stopped");
    Ok(())
}
