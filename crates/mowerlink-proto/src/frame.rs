//! Frame codec: `0xAA | length-varint | payload | checksum[2]`.
//!
//! The checksum is the two's-complement of the unsigned 16-bit sum of every
//! byte from the SOF marker through the last payload byte, written
//! big-endian. Verification re-sums those bytes plus the checksum itself and
//! requires the low 16 bits to be zero.

use bytes::Bytes;

use crate::{error::ProtocolError, varint};

/// Start-of-frame marker.
pub const SOF: u8 = 0xAA;

/// Result of a single decode attempt against a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A complete, checksum-verified frame was found.
    Frame {
        /// The frame's payload (the bytes between the length field and the
        /// checksum).
        payload: Bytes,
        /// Total bytes consumed from the buffer, including SOF, length
        /// varint, payload, and checksum.
        consumed: usize,
    },
    /// The buffer does not yet contain a complete frame.
    Incomplete,
}

/// Encode `payload` as a complete frame.
///
/// # Errors
///
/// Returns [`ProtocolError::LengthTooLong`] if `payload.len()` exceeds the
/// 21-bit varint cap (`2^21 - 1`).
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let length = u32::try_from(payload.len()).map_err(|_| ProtocolError::LengthTooLong)?;
    if length > varint::MAX_LENGTH {
        return Err(ProtocolError::LengthTooLong);
    }

    let mut out = Vec::with_capacity(1 + 3 + payload.len() + 2);
    out.push(SOF);
    varint::encode(length, &mut out);
    out.extend_from_slice(payload);

    let sum = checksum_input_sum(&out);
    let checksum = (!sum).wrapping_add(1);
    out.push((checksum >> 8) as u8);
    out.push((checksum & 0xFF) as u8);

    Ok(out)
}

/// Attempt to decode a single frame from the front of `buf`.
///
/// On [`DecodeOutcome::Frame`], the caller is responsible for advancing its
/// buffer past `consumed` bytes before decoding again. On
/// [`DecodeOutcome::Incomplete`], the caller should await more bytes and
/// retry with the same (unconsumed) buffer. On `Err`, the caller must
/// resynchronize (see the session layer's buffer-discard policy) before
/// decoding again.
pub fn decode(buf: &[u8]) -> Result<DecodeOutcome, ProtocolError> {
    let Some(&first) = buf.first() else {
        return Ok(DecodeOutcome::Incomplete);
    };
    if first != SOF {
        return Err(ProtocolError::InvalidSof { byte: first });
    }

    let Some((length, varint_len)) = varint::decode(&buf[1..])? else {
        return Ok(DecodeOutcome::Incomplete);
    };
    let length = length as usize;

    let header_len = 1 + varint_len;
    let total_len = header_len + length + 2;
    if buf.len() < total_len {
        return Ok(DecodeOutcome::Incomplete);
    }

    let payload = &buf[header_len..header_len + length];
    let checksum_bytes = &buf[header_len + length..total_len];
    let received_checksum = u16::from_be_bytes([checksum_bytes[0], checksum_bytes[1]]);

    let sum = checksum_input_sum(&buf[..header_len + length]);
    let expected_checksum = (!sum).wrapping_add(1);
    if expected_checksum != received_checksum {
        return Err(ProtocolError::ChecksumMismatch {
            expected: expected_checksum,
            actual: received_checksum,
        });
    }

    Ok(DecodeOutcome::Frame { payload: Bytes::copy_from_slice(payload), consumed: total_len })
}

/// Sum of bytes feeding the checksum, truncated to 16 bits via wrapping
/// arithmetic (equivalent to a 16-bit accumulator).
fn checksum_input_sum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_matches_spec_vector() {
        let frame = encode(&[]).unwrap();
        assert_eq!(frame, vec![0xAA, 0x00, 0xFF, 0x56]);
    }

    #[test]
    fn round_trip() {
        let payload = b"mower-telemetry";
        let frame = encode(payload).unwrap();
        match decode(&frame).unwrap() {
            DecodeOutcome::Frame { payload: decoded, consumed } => {
                assert_eq!(&decoded[..], &payload[..]);
                assert_eq!(consumed, frame.len());
            },
            DecodeOutcome::Incomplete => panic!("expected a complete frame"),
        }
    }

    #[test]
    fn incomplete_buffer() {
        let frame = encode(b"hello").unwrap();
        assert_eq!(decode(&frame[..frame.len() - 1]).unwrap(), DecodeOutcome::Incomplete);
        assert_eq!(decode(&[]).unwrap(), DecodeOutcome::Incomplete);
        assert_eq!(decode(&[SOF]).unwrap(), DecodeOutcome::Incomplete);
    }

    #[test]
    fn rejects_bad_sof() {
        assert_eq!(decode(&[0x00, 0x00]), Err(ProtocolError::InvalidSof { byte: 0x00 }));
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let mut frame = encode(b"hello").unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(decode(&frame), Err(ProtocolError::ChecksumMismatch { .. })));
    }

    #[test]
    fn single_byte_flip_in_payload_is_always_detected() {
        let payload = vec![0x11, 0x22, 0x33, 0x44, 0x55];
        let frame = encode(&payload).unwrap();
        let checksum_start = frame.len() - 2;

        for i in 0..checksum_start {
            for bit in 0..8u8 {
                let mut flipped = frame.clone();
                flipped[i] ^= 1 << bit;
                assert!(
                    matches!(decode(&flipped), Err(ProtocolError::ChecksumMismatch { .. })),
                    "flip at byte {i} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn extra_trailing_bytes_are_ignored() {
        let frame = encode(b"abc").unwrap();
        let mut buf = frame.clone();
        buf.extend_from_slice(b"next-frame-starts-here");

        match decode(&buf).unwrap() {
            DecodeOutcome::Frame { payload, consumed } => {
                assert_eq!(&payload[..], b"abc");
                assert_eq!(consumed, frame.len());
            },
            DecodeOutcome::Incomplete => panic!("expected a complete frame"),
        }
    }

    #[test]
    fn rejects_payload_over_cap() {
        let oversized = vec![0u8; varint::MAX_LENGTH as usize + 1];
        assert_eq!(encode(&oversized), Err(ProtocolError::LengthTooLong));
    }

    proptest::proptest! {
        #[test]
        fn decode_of_encode_round_trips(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..2048)) {
            let frame = encode(&payload).unwrap();
            match decode(&frame).unwrap() {
                DecodeOutcome::Frame { payload: decoded, consumed } => {
                    proptest::prop_assert_eq!(&decoded[..], &payload[..]);
                    proptest::prop_assert_eq!(consumed, frame.len());
                },
                DecodeOutcome::Incomplete => proptest::prop_assert!(false, "expected a complete frame"),
            }
        }

        #[test]
        fn decode_ignores_tail_bytes(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256), tail in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let mut buf = encode(&payload).unwrap();
            let frame_len = buf.len();
            buf.extend_from_slice(&tail);

            match decode(&buf).unwrap() {
                DecodeOutcome::Frame { consumed, .. } => proptest::prop_assert_eq!(consumed, frame_len),
                DecodeOutcome::Incomplete => proptest::prop_assert!(false, "expected a complete frame"),
            }
        }
    }
}
