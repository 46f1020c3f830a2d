use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{EiscpError, Result};

/// Frame header: magic (4) + header length (4) + payload length (4) + version (1) + reserved (3).
pub const HEADER_SIZE: usize = 16;

/// Magic bytes: "ISCP".
pub const MAGIC: [u8; 4] = *b"ISCP";

/// Protocol version written into every frame.
pub const VERSION: u8 = 0x01;

/// Command terminator.
pub const TERMINATOR: u8 = b'\r';

/// End-of-message control byte some receivers append to their payloads.
pub const EOF_MARKER: u8 = 0x1A;

/// Largest payload the reader accepts before declaring the stream corrupt.
pub const MAX_PAYLOAD: usize = 64 * 1024;

/// Encode an ASCII command into a complete eISCP frame.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬─────────────┬─────────┬──────────┬──────────────────┐
/// │ Magic (4B) │ Header len │ Payload len │ Version │ Reserved │ Payload          │
/// │ "ISCP"     │ (4B BE=16) │ (4B BE)     │ (1B)    │ (3B = 0) │ ASCII, CR-ended  │
/// └────────────┴────────────┴─────────────┴─────────┴──────────┴──────────────────┘
/// ```
///
/// A carriage return is appended when the command does not already end with one.
pub fn encode(command: &str) -> Bytes {
    let body = command.as_bytes();
    let needs_terminator = body.last() != Some(&TERMINATOR);
    let payload_len = body.len() + usize::from(needs_terminator);

    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload_len);
    dst.put_slice(&MAGIC);
    dst.put_u32(HEADER_SIZE as u32);
    dst.put_u32(payload_len as u32);
    dst.put_u8(VERSION);
    dst.put_slice(&[0, 0, 0]);
    dst.put_slice(body);
    if needs_terminator {
        dst.put_u8(TERMINATOR);
    }
    dst.freeze()
}

/// Decode the payload of a single complete frame.
///
/// Returns `None` when the header is incomplete, the magic is wrong or the
/// payload is shorter than the header announces.
pub fn decode(src: &[u8]) -> Option<String> {
    if src.len() < HEADER_SIZE || src[..4] != MAGIC {
        return None;
    }
    let (header_len, payload_len) = lengths(src);
    if header_len < HEADER_SIZE {
        return None;
    }
    let payload = src.get(header_len..header_len.checked_add(payload_len)?)?;
    Some(payload_text(payload))
}

/// Header and payload length fields. `src` must hold at least 12 bytes.
fn lengths(src: &[u8]) -> (usize, usize) {
    let header_len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
    let payload_len = u32::from_be_bytes([src[8], src[9], src[10], src[11]]) as usize;
    (header_len, payload_len)
}

/// Strip trailing EOF / CR / LF bytes and keep only ASCII.
fn payload_text(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .rposition(|b| !matches!(*b, EOF_MARKER | b'\r' | b'\n'))
        .map_or(0, |i| i + 1);

    payload[..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| char::from(b))
        .collect()
}

/// Incremental frame decoder for a single connection.
///
/// Socket reads are pushed in as they arrive; complete frames are pulled out
/// one at a time. Bytes already buffered are kept across calls, so a frame
/// split over any number of reads decodes exactly once.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    /// Create an empty reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the socket
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of bytes waiting to be decoded
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next complete frame's payload.
    ///
    /// `Ok(None)` means more bytes are needed. A corrupt header is an error
    /// because the stream can no longer be resynchronised.
    pub fn next_frame(&mut self) -> Result<Option<String>> {
        let seen = self.buf.len().min(MAGIC.len());
        if self.buf[..seen] != MAGIC[..seen] {
            return Err(EiscpError::Protocol(format!(
                "invalid frame magic {:02X?}",
                &self.buf[..seen]
            )));
        }
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let (header_len, payload_len) = lengths(&self.buf);
        if header_len < HEADER_SIZE {
            return Err(EiscpError::Protocol(format!(
                "header length {header_len} below {HEADER_SIZE}"
            )));
        }
        if payload_len > MAX_PAYLOAD {
            return Err(EiscpError::Protocol(format!(
                "payload too large ({payload_len} bytes, max {MAX_PAYLOAD})"
            )));
        }
        if self.buf.len() < header_len + payload_len {
            return Ok(None);
        }

        self.buf.advance(header_len);
        let payload = self.buf.split_to(payload_len);
        Ok(Some(payload_text(&payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(header_len: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&header_len.to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&[VERSION, 0, 0, 0]);
        out.resize(header_len as usize, 0);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode("!1PWR01");
        assert_eq!(&frame[..4], b"ISCP");
        assert_eq!(&frame[4..8], &16u32.to_be_bytes());
        assert_eq!(&frame[8..12], &8u32.to_be_bytes());
        assert_eq!(&frame[12..16], &[0x01, 0, 0, 0]);
        assert_eq!(&frame[16..], b"!1PWR01\r");
    }

    #[test]
    fn test_encode_does_not_duplicate_terminator() {
        let frame = encode("!1PWR01\r");
        assert_eq!(&frame[16..], b"!1PWR01\r");
        assert_eq!(&frame[8..12], &8u32.to_be_bytes());
    }

    #[test]
    fn test_roundtrip_strips_terminator() {
        for cmd in ["!1PWRQSTN", "!2ZVL32", "!3SL32B", ""] {
            assert_eq!(decode(&encode(cmd)).as_deref(), Some(cmd));
        }
    }

    #[test]
    fn test_decode_short_header() {
        assert_eq!(decode(b"ISCP\x00\x00"), None);
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut frame = encode("!1PWR01").to_vec();
        frame[0] = b'X';
        assert_eq!(decode(&frame), None);
    }

    #[test]
    fn test_decode_truncated_payload() {
        let frame = encode("!1MVL32");
        assert_eq!(decode(&frame[..frame.len() - 2]), None);
    }

    #[test]
    fn test_decode_strips_receiver_trailer() {
        let frame = raw_frame(16, b"!1MVL20\x1a\r\n");
        assert_eq!(decode(&frame).as_deref(), Some("!1MVL20"));
    }

    #[test]
    fn test_decode_ignores_non_ascii() {
        let frame = raw_frame(16, b"!1NLT\xc3\xa9A\r");
        assert_eq!(decode(&frame).as_deref(), Some("!1NLTA"));
    }

    #[test]
    fn test_reader_byte_by_byte() {
        let frame = encode("!2SLZ2B");
        let mut reader = FrameReader::new();
        for (i, byte) in frame.iter().enumerate() {
            assert!(reader.next_frame().unwrap().is_none(), "early frame at {i}");
            reader.push(&[*byte]);
        }
        assert_eq!(reader.next_frame().unwrap().as_deref(), Some("!2SLZ2B"));
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn test_reader_multiple_frames_in_one_read() {
        let mut chunk = encode("!1NLSC-P").to_vec();
        chunk.extend_from_slice(&encode("!1PWR01"));
        chunk.extend_from_slice(&encode("!1MVL")[..10]);

        let mut reader = FrameReader::new();
        reader.push(&chunk);
        assert_eq!(reader.next_frame().unwrap().as_deref(), Some("!1NLSC-P"));
        assert_eq!(reader.next_frame().unwrap().as_deref(), Some("!1PWR01"));
        assert!(reader.next_frame().unwrap().is_none());
        assert_eq!(reader.buffered(), 10);
    }

    #[test]
    fn test_reader_honours_longer_header() {
        let mut reader = FrameReader::new();
        reader.push(&raw_frame(24, b"!1AMT00\r"));
        assert_eq!(reader.next_frame().unwrap().as_deref(), Some("!1AMT00"));
    }

    #[test]
    fn test_reader_bad_magic_is_protocol_error() {
        let mut reader = FrameReader::new();
        reader.push(b"HTTP/1.1 400");
        assert!(matches!(reader.next_frame(), Err(EiscpError::Protocol(_))));
    }

    #[test]
    fn test_reader_rejects_oversized_payload() {
        let mut header = Vec::new();
        header.extend_from_slice(&MAGIC);
        header.extend_from_slice(&16u32.to_be_bytes());
        header.extend_from_slice(&((MAX_PAYLOAD + 1) as u32).to_be_bytes());
        header.extend_from_slice(&[VERSION, 0, 0, 0]);

        let mut reader = FrameReader::new();
        reader.push(&header);
        assert!(matches!(reader.next_frame(), Err(EiscpError::Protocol(_))));
    }
}
