//! Error types for the ingest server.

use std::net::SocketAddr;

use thiserror::Error;
use warden_alerts::NotificationError;
use warden_proto::{FramingError, ProtocolError};
use warden_store::StoreError;

/// Errors that can occur in the ingest server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// Frame assembly failed.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// A decoded frame violated the message protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A filesystem write or recovery failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Notification channels could not be built from configuration.
    #[error("notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Connection closed mid-message.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
