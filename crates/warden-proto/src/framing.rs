//! Length-prefixed frame transport.
//!
//! Every frame on the wire is a 4-byte little-endian unsigned length
//! followed by that many payload bytes. The codec assembles one frame at
//! a time and can be driven incrementally, so it works unchanged under
//! [`tokio_util::codec::Framed`] on a non-blocking stream.
//!
//! Payload lengths above [`MAX_FRAME_LEN`] are rejected as soon as the
//! prefix is read, before any payload is buffered. Zero-length frames are
//! legal and decode to an empty payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FramingError;

/// Number of bytes in the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload the codec accepts, in bytes (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Codec for length-prefixed frames over a byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec {
    /// Payload length parsed from the current prefix, if mid-frame.
    pending: Option<usize>,
}

impl FrameCodec {
    /// Creates a codec with no partial state.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match self.pending {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_LEN {
                    return Ok(None);
                }
                let mut prefix = [0u8; LENGTH_PREFIX_LEN];
                prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
                let len = u32::from_le_bytes(prefix) as usize;
                if len > MAX_FRAME_LEN {
                    return Err(FramingError::Oversize {
                        len,
                        max: MAX_FRAME_LEN,
                    });
                }
                src.advance(LENGTH_PREFIX_LEN);
                src.reserve(len);
                self.pending = Some(len);
                len
            }
        };

        if src.len() < len {
            return Ok(None);
        }

        self.pending = None;
        Ok(Some(src.split_to(len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if self.pending.is_some() || !src.is_empty() {
                    return Err(FramingError::Truncated {
                        buffered: src.len(),
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_LEN {
            return Err(FramingError::Oversize {
                len: item.len(),
                max: MAX_FRAME_LEN,
            });
        }
        dst.reserve(LENGTH_PREFIX_LEN + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_frame(payload: &[u8]) -> BytesMut {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::copy_from_slice(payload), &mut buf)
            .expect("encode");
        buf
    }

    // ==================== Encoding Tests ====================

    #[test]
    fn encode_prefixes_little_endian_length() {
        let buf = encode_frame(b"hello");
        assert_eq!(&buf[..4], &5u32.to_le_bytes());
        assert_eq!(&buf[4..], b"hello");
    }

    #[test]
    fn encode_empty_payload() {
        let buf = encode_frame(b"");
        assert_eq!(&buf[..], &0u32.to_le_bytes());
    }

    #[test]
    fn encode_rejects_oversize_payload() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let payload = Bytes::from(vec![0u8; MAX_FRAME_LEN + 1]);
        let result = codec.encode(payload, &mut buf);
        assert!(matches!(result, Err(FramingError::Oversize { .. })));
    }

    // ==================== Decoding Tests ====================

    #[test]
    fn decode_roundtrip() {
        let mut codec = FrameCodec::new();
        let mut buf = encode_frame(b"payload bytes");
        let frame = codec.decode(&mut buf).expect("decode");
        assert_eq!(frame.as_deref(), Some(b"payload bytes".as_slice()));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_empty_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = encode_frame(b"");
        let frame = codec.decode(&mut buf).expect("decode");
        assert_eq!(frame.as_deref(), Some(b"".as_slice()));
    }

    #[test]
    fn decode_partial_prefix_returns_none() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&5u32.to_le_bytes()[..2]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());
    }

    #[test]
    fn decode_partial_payload_returns_none() {
        let mut codec = FrameCodec::new();
        let full = encode_frame(b"hello");
        let mut buf = BytesMut::from(&full[..6]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());
    }

    #[test]
    fn decode_incremental_byte_at_a_time() {
        let mut codec = FrameCodec::new();
        let full = encode_frame(b"drip-fed");
        let mut buf = BytesMut::new();

        let mut decoded = None;
        for (i, byte) in full.iter().enumerate() {
            buf.put_u8(*byte);
            if let Some(frame) = codec.decode(&mut buf).expect("decode") {
                assert_eq!(i, full.len() - 1, "frame completed early");
                decoded = Some(frame);
            }
        }
        assert_eq!(decoded.as_deref(), Some(b"drip-fed".as_slice()));
    }

    #[test]
    fn decode_two_frames_from_one_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = encode_frame(b"first");
        buf.extend_from_slice(&encode_frame(b"second"));

        let one = codec.decode(&mut buf).expect("decode");
        let two = codec.decode(&mut buf).expect("decode");
        assert_eq!(one.as_deref(), Some(b"first".as_slice()));
        assert_eq!(two.as_deref(), Some(b"second".as_slice()));
        assert!(codec.decode(&mut buf).expect("decode").is_none());
    }

    #[test]
    fn decode_rejects_oversize_length_before_payload_arrives() {
        let mut codec = FrameCodec::new();
        let oversize = (MAX_FRAME_LEN as u32) + 1;
        let mut buf = BytesMut::from(&oversize.to_le_bytes()[..]);
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(FramingError::Oversize { .. })));
    }

    #[test]
    fn decode_accepts_max_length_prefix() {
        let mut codec = FrameCodec::new();
        let max = MAX_FRAME_LEN as u32;
        let mut buf = BytesMut::from(&max.to_le_bytes()[..]);
        // Payload has not arrived yet: not an error, just incomplete.
        assert!(codec.decode(&mut buf).expect("decode").is_none());
    }

    // ==================== EOF Tests ====================

    #[test]
    fn decode_eof_clean_end() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).expect("decode_eof").is_none());
    }

    #[test]
    fn decode_eof_mid_payload_is_truncated() {
        let mut codec = FrameCodec::new();
        let full = encode_frame(b"cut off");
        let mut buf = BytesMut::from(&full[..5]);
        assert!(codec.decode(&mut buf).expect("decode").is_none());
        let result = codec.decode_eof(&mut buf);
        assert!(matches!(result, Err(FramingError::Truncated { .. })));
    }

    #[test]
    fn decode_eof_mid_prefix_is_truncated() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&3u32.to_le_bytes()[..2]);
        let result = codec.decode_eof(&mut buf);
        assert!(matches!(result, Err(FramingError::Truncated { .. })));
    }

    #[test]
    fn decode_eof_returns_last_complete_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = encode_frame(b"final");
        let frame = codec.decode_eof(&mut buf).expect("decode_eof");
        assert_eq!(frame.as_deref(), Some(b"final".as_slice()));
        assert!(codec.decode_eof(&mut buf).expect("decode_eof").is_none());
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let mut codec = FrameCodec::new();
            let mut buf = BytesMut::new();
            codec
                .encode(Bytes::from(payload.clone()), &mut buf)
                .expect("encode");
            let frame = codec.decode(&mut buf).expect("decode").expect("complete frame");
            prop_assert_eq!(frame.as_ref(), payload.as_slice());
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn prop_split_feed_decodes_identically(
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            split in 0usize..520,
        ) {
            let mut codec = FrameCodec::new();
            let mut encoded = BytesMut::new();
            codec
                .encode(Bytes::from(payload.clone()), &mut encoded)
                .expect("encode");

            let split = split.min(encoded.len());
            let mut buf = BytesMut::from(&encoded[..split]);
            let early = codec.decode(&mut buf).expect("decode");
            if split < encoded.len() {
                prop_assert!(early.is_none());
                buf.extend_from_slice(&encoded[split..]);
                let frame = codec.decode(&mut buf).expect("decode").expect("complete frame");
                prop_assert_eq!(frame.as_ref(), payload.as_slice());
            } else {
                let frame = early.expect("complete frame");
                prop_assert_eq!(frame.as_ref(), payload.as_slice());
            }
        }
    }
}
