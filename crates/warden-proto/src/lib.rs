//! Wire protocol for the warden ingestion server.
//!
//! Camera hosts stream length-prefixed frames over TCP: a 4-byte
//! little-endian length followed by a JSON payload (image bytes are the
//! one raw-payload exception). This crate provides the pieces both ends
//! share:
//!
//! - [`FrameCodec`] - incremental frame assembly for
//!   `tokio_util::codec::Framed`
//! - [`HeaderTag`] - the closed set of message headers
//! - [`DetectionBox`] and [`filtered_labels`] - detection metadata and
//!   label filtering
//! - [`DashboardEvent`] - updates pushed to the presentation layer
//!
//! # Example
//!
//! ```
//! use warden_proto::{decode_header, encode_payload, HeaderTag};
//!
//! let payload = encode_payload(&HeaderTag::Hostname)?;
//! assert_eq!(decode_header(&payload)?, HeaderTag::Hostname);
//! # Ok::<(), warden_proto::ProtocolError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod detection;
pub mod error;
pub mod events;
pub mod framing;
pub mod messages;

pub use detection::{filtered_labels, DetectionBox};
pub use error::{FramingError, ProtocolError};
pub use events::DashboardEvent;
pub use framing::{FrameCodec, LENGTH_PREFIX_LEN, MAX_FRAME_LEN};
pub use messages::{decode_header, decode_payload, encode_payload, HeaderTag};
