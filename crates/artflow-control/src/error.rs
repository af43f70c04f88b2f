//! Error types for Art-Net output
use artflow_core::CoreError;
use thiserror::Error;

/// Control system errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// Configuration error from the engine
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A frame could not be handed to the network
    #[error("Transport error: {0}")]
    Transport(String),

    /// Node address could not be resolved
    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    /// Operation not allowed in the node's current state
    #[error("Node state error: {0}")]
    NodeState(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
