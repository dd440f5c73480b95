use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Connection to the agent could not be used; its pool entry has been evicted.
    #[error("rpc unavailable: {0}")]
    Unavailable(String),

    #[error("rpc timeout")]
    Timeout,

    #[error("manual stop")]
    ManualStop,

    /// Error text reported by the agent for a completed call.
    #[error("{0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl RpcError {
    pub fn is_manual_stop(&self) -> bool {
        matches!(self, RpcError::ManualStop)
    }
}

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        use tonic::Code;
        match status.code() {
            Code::Unavailable => RpcError::Unavailable(status.message().to_string()),
            Code::DeadlineExceeded => RpcError::Timeout,
            Code::Cancelled => RpcError::ManualStop,
            _ => RpcError::Transport(format!("{}: {}", status.code(), status.message())),
        }
    }
}

impl From<tonic::transport::Error> for RpcError {
    fn from(err: tonic::transport::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Status;

    #[test]
    fn status_codes_are_classified() {
        assert!(matches!(RpcError::from(Status::unavailable("down")), RpcError::Unavailable(m) if m == "down"));
        assert_eq!(RpcError::from(Status::deadline_exceeded("late")), RpcError::Timeout);
        assert!(RpcError::from(Status::cancelled("bye")).is_manual_stop());
        assert!(matches!(RpcError::from(Status::internal("x")), RpcError::Transport(_)));
    }

    #[test]
    fn manual_stop_display_is_the_wire_sentinel() {
        assert_eq!(RpcError::ManualStop.to_string(), crate::MANUAL_STOP);
    }
}
