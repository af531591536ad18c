use crate::dom::NodeId;
use thiserror::Error;

/// Errors raised by the bridge itself.
///
/// Faults observed on the host page (script errors, rejected promises, failed
/// requests) are never represented here: they are forwarded to the parent frame
/// and handed back to the page untouched.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The page already carries an installed bridge
    #[error("Bridge is already installed on this page")]
    AlreadyInstalled,

    /// A message or argument could not be turned into JSON
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The parent frame is gone
    #[error("Parent channel is closed")]
    ChannelClosed,

    /// The transport refused the message
    #[error("Failed to send message: {0}")]
    Send(String),

    /// A location could not be parsed or resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A DOM node id does not belong to the document
    #[error("Node {0} not found in document")]
    NodeNotFound(NodeId),

    /// Installation happened outside a tokio runtime
    #[error("No tokio runtime to schedule bridge work on: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// A node that is still part of the document cannot be attached again
    #[error("Node {0} is already attached")]
    NodeAttached(NodeId),

    /// A configuration value is out of range
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
