//! Header tags and payload serialization.
//!
//! A protocol message is a header frame followed by zero or more body
//! frames. The header payload is one of the fixed tag strings in
//! [`HeaderTag`]; body payloads are JSON values whose shape depends on
//! the tag. The one exception is the image-bytes frame that follows an
//! `IMAGE` boxes frame: it carries the raw image and is never decoded
//! here.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Header tags understood by the ingest protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderTag {
    /// Opens the configuration handshake. No body.
    Config,
    /// Handshake field: the device's hostname. String body.
    Hostname,
    /// Handshake field: continue the prior run. Boolean body.
    ContinueRun,
    /// Handshake field: classes the device records. String-list body.
    Classes,
    /// Ends the handshake. No body.
    Done,
    /// An image report: a detection-box body frame, then raw image bytes.
    Image,
    /// A liveness signal. Unix-timestamp body.
    Connection,
}

impl HeaderTag {
    /// The tag's wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::Hostname => "HOSTNAME",
            Self::ContinueRun => "CONTINUE_RUN",
            Self::Classes => "CLASSES",
            Self::Done => "DONE",
            Self::Image => "IMAGE",
            Self::Connection => "CONNECTION",
        }
    }

    /// Parses a wire string into a tag.
    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "CONFIG" => Some(Self::Config),
            "HOSTNAME" => Some(Self::Hostname),
            "CONTINUE_RUN" => Some(Self::ContinueRun),
            "CLASSES" => Some(Self::Classes),
            "DONE" => Some(Self::Done),
            "IMAGE" => Some(Self::Image),
            "CONNECTION" => Some(Self::Connection),
            _ => None,
        }
    }

    /// Whether a body frame follows this header during the handshake or
    /// steady state.
    #[must_use]
    pub const fn expects_body(self) -> bool {
        !matches!(self, Self::Config | Self::Done)
    }
}

impl fmt::Display for HeaderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes a value as a frame payload.
///
/// # Errors
///
/// Returns [`ProtocolError::Payload`] if the value cannot be serialized.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Deserializes a frame payload.
///
/// # Errors
///
/// Returns [`ProtocolError::Payload`] if the payload does not decode to
/// the requested type.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decodes a header frame payload into a tag.
///
/// # Errors
///
/// Returns [`ProtocolError::Payload`] if the payload is not a JSON
/// string, or [`ProtocolError::UnknownHeader`] if the string is not a
/// defined tag.
pub fn decode_header(payload: &[u8]) -> Result<HeaderTag, ProtocolError> {
    let raw: String = decode_payload(payload)?;
    HeaderTag::from_wire(&raw).ok_or(ProtocolError::UnknownHeader { found: raw })
}
