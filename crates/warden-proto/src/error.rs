//! Error types for the wire protocol.

use thiserror::Error;

use crate::messages::HeaderTag;

/// Errors produced while assembling frames from a byte stream.
///
/// Any of these is fatal to the connection that produced it.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The declared payload length exceeds the codec's cap.
    #[error("frame length {len} exceeds maximum {max}")]
    Oversize {
        /// Declared payload length in bytes.
        len: usize,
        /// Largest payload the codec accepts.
        max: usize,
    },

    /// The stream ended in the middle of a frame.
    #[error("stream ended mid-frame with {buffered} bytes buffered")]
    Truncated {
        /// Bytes left unconsumed when the stream ended.
        buffered: usize,
    },

    /// Underlying transport error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while interpreting decoded frames as protocol
/// messages.
///
/// Any of these is fatal to the connection that produced it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A header frame carried a tag this protocol does not define.
    #[error("unknown header tag: {found:?}")]
    UnknownHeader {
        /// The tag string received.
        found: String,
    },

    /// A header arrived that is not valid in the current session state.
    #[error("unexpected header: {header}")]
    UnexpectedHeader {
        /// The header received.
        header: HeaderTag,
    },

    /// A header's required body frame never arrived.
    #[error("missing body frame after {header} header")]
    MissingBody {
        /// The header that requires a body.
        header: HeaderTag,
    },

    /// The handshake finished without a required field.
    #[error("handshake completed without {missing}")]
    IncompleteHandshake {
        /// Name of the missing field.
        missing: &'static str,
    },

    /// The handshake declared a hostname that cannot name a directory.
    #[error("hostname {hostname:?} is not usable as a directory name")]
    InvalidHostname {
        /// The hostname received.
        hostname: String,
    },

    /// A frame payload failed to serialize or deserialize.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}
