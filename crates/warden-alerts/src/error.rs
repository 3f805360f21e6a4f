//! Error types for the warden-alerts crate.

use thiserror::Error;

/// Errors that can occur while building or sending notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The carrier has no known MMS gateway.
    #[error("unknown carrier: {carrier}")]
    UnknownCarrier {
        /// The carrier name that could not be resolved.
        carrier: String,
    },

    /// A channel was configured without any recipients.
    #[error("no recipients configured for channel: {channel}")]
    NoRecipients {
        /// The channel missing recipients.
        channel: String,
    },

    /// Notification delivery failed.
    #[error("notification transport failed: {reason}")]
    Transport {
        /// The reason delivery failed.
        reason: String,
    },
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
