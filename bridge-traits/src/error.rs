use thiserror::Error;

/// Failure handing work to the host environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Host event loop is not running")]
    HostUnavailable,

    #[error("Host rejected dispatched work: {0}")]
    DispatchRejected(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
