//! Remote execution transport.
//!
//! * [`RpcClient`] issues run/stop/tail calls against worker agents through a [`ConnectionPool`].
//! * [`AgentService`] hosts the shell execution core behind the `Agent.Run` RPC and tracks
//!   per-run stop slots and output buffers.
//! * [`serve`] binds the agent listener with keep-alive tuning, optional TLS and signal handling.

pub mod proto {
    tonic::include_proto!("cronfleet.v1");
}
pub use proto::{TaskRequest, TaskResponse};
pub use proto::agent_client::AgentClient;
pub use proto::agent_server::AgentServer;

mod error;
pub use error::RpcError;

mod sentinel;
pub use sentinel::{
    CLIENT_GRACE, MANUAL_STOP, MAX_TIMEOUT_SECS, STOP_COMMAND, TAIL_COMMAND, TAIL_TIMEOUT_SECS,
    clamp_timeout,
};

mod config;
pub use config::{KeepAlive, PoolConfig, ServerConfig, TlsFiles};

mod tls;

mod pool;
pub use pool::{ConnectionPool, GrpcPool};

mod client;
pub use client::{ExecOutput, RpcClient};

mod server;
pub use server::AgentService;

mod listener;
pub use listener::{serve, serve_with_incoming};

pub use tonic;
