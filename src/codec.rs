//! Wire frame encoding/decoding (C5).
//!
//! Frames have no length prefix and no version tag; each message kind has a
//! fixed length known to both ends. Integers use the host's native byte
//! order; cross-endian compatibility is not required.
//!
//! The fixed-size headers are `#[repr(C)]` `Pod` structs cast directly to
//! and from `&[u8]` with `bytemuck`, the same "cast a plain-old-data struct
//! to a byte slice" idiom used for GPU vertex buffers elsewhere in this
//! dependency stack, applied here to wire frames instead.

use bytemuck::{Pod, Zeroable};

use crate::error::MeshError;

/// `[key: i32]` — the WRITE-REQ and READ-REQ header.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct KeyHeader {
    key: i32,
}

/// `[key: i32][timestamp: i64]` — the INVALIDATE frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct NotificationHeader {
    key: i32,
    timestamp: i64,
}

const KEY_HEADER_LEN: usize = std::mem::size_of::<KeyHeader>();
const NOTIFICATION_LEN: usize = std::mem::size_of::<NotificationHeader>();

/// Encodes a READ request: `[key: i32]`, length 4.
pub fn encode_read_request(key: i32) -> Vec<u8> {
    bytemuck::bytes_of(&KeyHeader { key }).to_vec()
}

/// Decodes a READ request. Fails if `buf` is not exactly 4 bytes.
pub fn decode_read_request(buf: &[u8]) -> Result<i32, MeshError> {
    if buf.len() != KEY_HEADER_LEN {
        return Err(MeshError::TransportError(format!(
            "read request frame must be {KEY_HEADER_LEN} bytes, got {}",
            buf.len()
        )));
    }
    let header: KeyHeader = *bytemuck::from_bytes(buf);
    Ok(header.key)
}

/// Encodes a WRITE request: `[key: i32][payload: S bytes]`.
pub fn encode_write(key: i32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(KEY_HEADER_LEN + payload.len());
    buf.extend_from_slice(bytemuck::bytes_of(&KeyHeader { key }));
    buf.extend_from_slice(payload);
    buf
}

/// Decodes a WRITE request, assuming `buf.len() == 4 + block_size`.
pub fn decode_write(buf: &[u8], block_size: usize) -> Result<(i32, Vec<u8>), MeshError> {
    let expected = KEY_HEADER_LEN + block_size;
    if buf.len() != expected {
        return Err(MeshError::TransportError(format!(
            "write request frame must be {expected} bytes, got {}",
            buf.len()
        )));
    }
    let header: KeyHeader = *bytemuck::from_bytes(&buf[..KEY_HEADER_LEN]);
    Ok((header.key, buf[KEY_HEADER_LEN..].to_vec()))
}

/// Encodes an INVALIDATE notification: `[key: i32][timestamp: i64]`.
pub fn encode_notification(key: i32, timestamp: i64) -> Vec<u8> {
    bytemuck::bytes_of(&NotificationHeader { key, timestamp }).to_vec()
}

/// Decodes an INVALIDATE notification. Fails if `buf` is not exactly 12 bytes.
pub fn decode_notification(buf: &[u8]) -> Result<(i32, i64), MeshError> {
    if buf.len() != NOTIFICATION_LEN {
        return Err(MeshError::TransportError(format!(
            "notification frame must be {NOTIFICATION_LEN} bytes, got {}",
            buf.len()
        )));
    }
    let header: NotificationHeader = *bytemuck::from_bytes(buf);
    Ok((header.key, header.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn write_frame_has_fixed_length() {
        let payload = vec![1u8, 2, 3, 4];
        let frame = encode_write(7, &payload);
        assert_eq!(frame.len(), 4 + payload.len());
    }

    #[test]
    fn notification_frame_is_twelve_bytes() {
        assert_eq!(encode_notification(1, 2).len(), 12);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(decode_write(&[0u8; 3], 4).is_err());
        assert!(decode_notification(&[0u8; 11]).is_err());
        assert!(decode_read_request(&[0u8; 3]).is_err());
    }

    proptest! {
        #[test]
        fn write_round_trips(key in any::<i32>(), payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            let frame = encode_write(key, &payload);
            let (decoded_key, decoded_payload) = decode_write(&frame, payload.len()).unwrap();
            prop_assert_eq!(decoded_key, key);
            prop_assert_eq!(decoded_payload, payload);
        }

        #[test]
        fn notification_round_trips(key in any::<i32>(), timestamp in any::<i64>()) {
            let frame = encode_notification(key, timestamp);
            let (decoded_key, decoded_timestamp) = decode_notification(&frame).unwrap();
            prop_assert_eq!(decoded_key, key);
            prop_assert_eq!(decoded_timestamp, timestamp);
        }

        #[test]
        fn read_request_round_trips(key in any::<i32>()) {
            let frame = encode_read_request(key);
            let decoded = decode_read_request(&frame).unwrap();
            prop_assert_eq!(decoded, key);
        }
    }
}
