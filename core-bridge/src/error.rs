use thiserror::Error;

use crate::registry::{Handle, HandleState};

/// Failures of the bridge's own bookkeeping and setup.
///
/// These never reach the host as call rejections; see
/// [`HostError`](crate::translator::HostError) for that.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Handle {0} was never allocated")]
    UnknownHandle(Handle),

    #[error("Handle {0} was already released")]
    AlreadyReleased(Handle),

    #[error("Handle {handle} cannot be released while {state:?}")]
    NotSettled { handle: Handle, state: HandleState },

    #[error("Failed to start native runtime: {0}")]
    RuntimeStart(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Host(#[from] bridge_traits::BridgeError),
}

pub type Result<T> = std::result::Result<T, Error>;
