use std::future::Future;

use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::{AgentServer, AgentService, RpcError, ServerConfig, tls};

fn builder(cfg: &ServerConfig) -> Result<Server, RpcError> {
    let ka = cfg.keepalive;
    let mut builder = Server::builder()
        .tcp_keepalive(Some(ka.tcp))
        .http2_keepalive_interval(Some(ka.http2_interval))
        .http2_keepalive_timeout(Some(ka.http2_timeout));

    if let Some(files) = &cfg.tls {
        builder = builder
            .tls_config(tls::server_config(files)?)
            .map_err(|e| RpcError::Tls(e.to_string()))?;
    }
    Ok(builder)
}

/// Serves `service` on `cfg.addr` until SIGINT or SIGTERM, then drains in-flight calls.
///
/// SIGHUP is logged and ignored, so the agent survives its controlling terminal closing.
pub async fn serve(cfg: &ServerConfig, service: AgentService) -> Result<(), RpcError> {
    info!(addr = %cfg.addr, tls = cfg.tls.is_some(), "agent listening");
    builder(cfg)?
        .add_service(AgentServer::new(service))
        .serve_with_shutdown(cfg.addr, shutdown_signal())
        .await?;
    info!("agent stopped");
    Ok(())
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve_with_incoming<F>(
    cfg: &ServerConfig,
    service: AgentService,
    incoming: TcpListenerStream,
    shutdown: F,
) -> Result<(), RpcError>
where
    F: Future<Output = ()>,
{
    builder(cfg)?
        .add_service(AgentServer::new(service))
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await?;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut term, mut hup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(term), Ok(hup)) => (term, hup),
        _ => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT; shutting down");
                return;
            }
            _ = term.recv() => {
                info!("received SIGTERM; shutting down");
                return;
            }
            _ = hup.recv() => info!("received SIGHUP; ignoring"),
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C; shutting down");
}
