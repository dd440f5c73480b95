use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),
    #[error("unknown notify policy: {0}")]
    UnknownNotifyPolicy(String),
}
