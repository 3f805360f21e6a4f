//! Events pushed to the dashboard.
//!
//! The ingestion server communicates with the presentation layer through
//! a FIFO of these events. Within one connection a session emits exactly
//! one [`DashboardEvent::Initialize`] before any other event for its
//! hostname.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// A live update for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// A host session started, or was recovered from disk at startup.
    Initialize {
        /// Hostname of the camera device.
        hostname: String,
        /// Classes the host records.
        filter_classes: Vec<String>,
        /// Path of the session's image log.
        image_log_path: PathBuf,
        /// When the session started or was last heard from.
        timestamp: DateTime<Utc>,
    },
    /// An image was stored.
    Image {
        /// Hostname of the camera device.
        hostname: String,
        /// Path of the stored image.
        image_path: PathBuf,
        /// Filtered labels, first-seen order.
        labels: Vec<String>,
        /// When the image was processed.
        timestamp: DateTime<Utc>,
    },
    /// A liveness signal arrived.
    Connection {
        /// Hostname of the camera device.
        hostname: String,
        /// Timestamp reported by the device.
        timestamp: DateTime<Utc>,
    },
}

impl DashboardEvent {
    /// Creates an initialize event.
    #[must_use]
    pub fn initialize(
        hostname: impl Into<String>,
        filter_classes: Vec<String>,
        image_log_path: impl Into<PathBuf>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Initialize {
            hostname: hostname.into(),
            filter_classes,
            image_log_path: image_log_path.into(),
            timestamp,
        }
    }

    /// Creates an image event.
    #[must_use]
    pub fn image(
        hostname: impl Into<String>,
        image_path: impl Into<PathBuf>,
        labels: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::Image {
            hostname: hostname.into(),
            image_path: image_path.into(),
            labels,
            timestamp,
        }
    }

    /// Creates a connection event.
    #[must_use]
    pub fn connection(hostname: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::Connection {
            hostname: hostname.into(),
            timestamp,
        }
    }

    /// Hostname the event concerns.
    #[must_use]
    pub fn hostname(&self) -> &str {
        match self {
            Self::Initialize { hostname, .. }
            | Self::Image { hostname, .. }
            | Self::Connection { hostname, .. } => hostname,
        }
    }

    /// When the event happened.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Initialize { timestamp, .. }
            | Self::Image { timestamp, .. }
            | Self::Connection { timestamp, .. } => *timestamp,
        }
    }

    /// Whether this is an initialize event.
    #[must_use]
    pub const fn is_initialize(&self) -> bool {
        matches!(self, Self::Initialize { .. })
    }

    /// Serializes the event to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes an event from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Payload`] if the JSON does not describe
    /// an event.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(json)?)
    }
}
