use crate::config::ValidationError;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Errors raised while dispatching an event. Tracker failures are passed
/// through untouched; there is no retry at this layer.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("tracker error: {0}")]
    Tracker(#[from] redmine::TrackerError),
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}
