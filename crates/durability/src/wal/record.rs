//! Record framing
//!
//! ```text
//! +-----------+-------------+----------------------+
//! | len (u32) | crc32 (u32) | payload (len bytes)  |
//! +-----------+-------------+----------------------+
//! ```
//!
//! Both header fields are little-endian. The CRC covers the payload only.
//! The payload is the bincode encoding of a [`JournalRecord`].

use byteorder::{ByteOrder, LittleEndian};
use qpledger_storage::JournalRecord;

use super::WalError;

/// Bytes before the payload
pub const FRAME_HEADER_LEN: usize = 8;

/// Largest payload accepted on read; anything bigger is treated as a torn
/// length field
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

/// Encode a record into one frame
pub fn encode_frame(record: &JournalRecord) -> Result<Vec<u8>, WalError> {
    let payload = bincode::serialize(record).map_err(|e| WalError::Encode(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_LEN)
        .ok_or_else(|| WalError::Encode(format!("record of {} bytes is too large", payload.len())))?;

    let mut frame = vec![0u8; FRAME_HEADER_LEN + payload.len()];
    LittleEndian::write_u32(&mut frame[0..4], len);
    LittleEndian::write_u32(&mut frame[4..8], crc32fast::hash(&payload));
    frame[FRAME_HEADER_LEN..].copy_from_slice(&payload);
    Ok(frame)
}

/// Result of decoding one frame at the front of a buffer
#[derive(Debug)]
pub enum FrameDecode {
    /// A whole, checksummed record and the number of bytes it occupied
    Complete {
        /// Decoded record
        record: JournalRecord,
        /// Frame length including header
        frame_len: usize,
    },
    /// The buffer ends mid-frame
    Incomplete,
    /// The frame is damaged
    Corrupt(String),
}

/// Decode the frame at the start of `buf`
pub fn decode_frame(buf: &[u8]) -> FrameDecode {
    if buf.len() < FRAME_HEADER_LEN {
        return FrameDecode::Incomplete;
    }
    let len = LittleEndian::read_u32(&buf[0..4]);
    if len > MAX_PAYLOAD_LEN {
        return FrameDecode::Corrupt(format!("frame length {len} exceeds limit"));
    }
    let frame_len = FRAME_HEADER_LEN + len as usize;
    if buf.len() < frame_len {
        return FrameDecode::Incomplete;
    }

    let expected = LittleEndian::read_u32(&buf[4..8]);
    let payload = &buf[FRAME_HEADER_LEN..frame_len];
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return FrameDecode::Corrupt(format!(
            "crc mismatch: stored {expected:08x}, computed {actual:08x}"
        ));
    }

    match bincode::deserialize::<JournalRecord>(payload) {
        Ok(record) => FrameDecode::Complete { record, frame_len },
        Err(e) => FrameDecode::Corrupt(format!("undecodable payload: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpledger_storage::{BatchOp, Partition};

    fn record() -> JournalRecord {
        JournalRecord {
            seq: 7,
            ops: vec![
                BatchOp::Put {
                    partition: Partition::R,
                    key: b"a:1".to_vec(),
                    value: b"hello".to_vec(),
                },
                BatchOp::Merge {
                    partition: Partition::Ethics,
                    key: b"writes/a".to_vec(),
                    delta: 1,
                },
            ],
        }
    }

    #[test]
    fn test_frame_decodes() {
        let frame = encode_frame(&record()).unwrap();
        match decode_frame(&frame) {
            FrameDecode::Complete { record: r, frame_len } => {
                assert_eq!(r, record());
                assert_eq!(frame_len, frame.len());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_truncated_frame_is_incomplete() {
        let frame = encode_frame(&record()).unwrap();
        assert!(matches!(decode_frame(&frame[..3]), FrameDecode::Incomplete));
        assert!(matches!(
            decode_frame(&frame[..frame.len() - 1]),
            FrameDecode::Incomplete
        ));
    }

    #[test]
    fn test_flipped_payload_bit_is_corrupt() {
        let mut frame = encode_frame(&record()).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        assert!(matches!(decode_frame(&frame), FrameDecode::Corrupt(_)));
    }

    #[test]
    fn test_absurd_length_is_corrupt() {
        let mut frame = vec![0xFF; FRAME_HEADER_LEN];
        frame.extend_from_slice(b"junk");
        assert!(matches!(decode_frame(&frame), FrameDecode::Corrupt(_)));
    }
}
