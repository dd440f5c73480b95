use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use crate::{AgentClient, PoolConfig, RpcError, tls};

/// Address-keyed cache of reusable agent connections.
#[async_trait]
pub trait ConnectionPool: Send + Sync + 'static {
    /// Returns a client for `addr` (`host:port`), connecting if no entry exists.
    async fn get(&self, addr: &str) -> Result<AgentClient<Channel>, RpcError>;

    /// Evicts the entry for `addr`; the next [`get`](Self::get) reconnects.
    fn release(&self, addr: &str);

    fn size(&self) -> usize;
}

/// [`ConnectionPool`] over tonic channels.
pub struct GrpcPool {
    cfg: PoolConfig,
    tls: Option<ClientTlsConfig>,
    channels: Mutex<HashMap<String, Channel>>,
}

impl GrpcPool {
    pub fn new(cfg: PoolConfig) -> Result<Self, RpcError> {
        let tls = cfg
            .tls
            .as_ref()
            .map(|files| tls::client_config(files, cfg.tls_domain.as_deref()))
            .transpose()?;
        Ok(Self {
            cfg,
            tls,
            channels: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, addr: &str) -> Option<Channel> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(addr)
            .cloned()
    }

    async fn connect(&self, addr: &str) -> Result<Channel, RpcError> {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        let ka = self.cfg.keepalive;

        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{addr}"))
            .map_err(|e| RpcError::InvalidAddress(format!("{addr}: {e}")))?
            .connect_timeout(self.cfg.connect_timeout)
            .tcp_keepalive(Some(ka.tcp))
            .http2_keep_alive_interval(ka.http2_interval)
            .keep_alive_timeout(ka.http2_timeout)
            .keep_alive_while_idle(true);
        if let Some(tls) = &self.tls {
            endpoint = endpoint
                .tls_config(tls.clone())
                .map_err(|e| RpcError::Tls(e.to_string()))?;
        }

        endpoint
            .connect()
            .await
            .map_err(|e| RpcError::Unavailable(format!("{addr}: {e}")))
    }
}

#[async_trait]
impl ConnectionPool for GrpcPool {
    async fn get(&self, addr: &str) -> Result<AgentClient<Channel>, RpcError> {
        if let Some(channel) = self.cached(addr) {
            return Ok(AgentClient::new(channel));
        }

        // dial without holding the lock; a concurrent winner's channel is kept
        let channel = self.connect(addr).await?;
        let channel = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(addr.to_string())
            .or_insert(channel)
            .clone();
        debug!(addr, "pooled agent connection");
        Ok(AgentClient::new(channel))
    }

    fn release(&self, addr: &str) {
        let removed = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(addr);
        if removed.is_some() {
            debug!(addr, "released agent connection");
        }
    }

    fn size(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
