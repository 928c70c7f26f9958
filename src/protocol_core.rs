//! Length-prefixed frame I/O shared by the control and data channels
//!
//! Wire format: `<ASCII decimal length>@<payload>`. The length is a byte
//! count for both text and binary payloads; there is no trailing delimiter.
//!
//! Readers consume the header one byte at a time and never read past the end
//! of the current frame. Nothing is buffered, so socket readiness reported by
//! the OS still describes the next unread frame.

use std::io::{ErrorKind, Read, Write};

use crate::error::{FtError, Result};
use crate::protocol::{LENGTH_TERMINATOR, MAX_FRAME_SIZE, MAX_LENGTH_DIGITS};

/// Validate a declared payload size against MAX_FRAME_SIZE
pub fn validate_frame_size(size: usize) -> Result<()> {
    if size > MAX_FRAME_SIZE {
        return Err(FtError::ProtocolViolation(format!(
            "frame payload too large: {} bytes (max: {})",
            size, MAX_FRAME_SIZE
        )));
    }
    Ok(())
}

/// Build the frame header for a payload of `len` bytes
pub fn build_frame_header(len: usize) -> Vec<u8> {
    let mut hdr = len.to_string().into_bytes();
    hdr.push(LENGTH_TERMINATOR);
    hdr
}

/// Build a complete frame (header + payload)
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = build_frame_header(payload.len());
    buf.extend_from_slice(payload);
    buf
}

/// Send one frame. Header and payload are each written in full.
pub fn send_frame<W: Write + ?Sized>(stream: &mut W, payload: &[u8]) -> Result<()> {
    stream
        .write_all(&build_frame_header(payload.len()))
        .map_err(FtError::SendFailed)?;
    if !payload.is_empty() {
        stream.write_all(payload).map_err(FtError::SendFailed)?;
    }
    stream.flush().map_err(FtError::SendFailed)
}

pub fn send_text<W: Write + ?Sized>(stream: &mut W, text: &str) -> Result<()> {
    send_frame(stream, text.as_bytes())
}

/// Read the `<digits>@` header and return the declared payload length
pub fn read_frame_header<R: Read + ?Sized>(stream: &mut R) -> Result<usize> {
    let mut digits = String::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Err(FtError::ConnectionClosed),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FtError::ReceiveFailed(e)),
        }
        let b = byte[0];
        if b == LENGTH_TERMINATOR {
            break;
        }
        if !b.is_ascii_digit() {
            return Err(FtError::ProtocolViolation(format!(
                "unexpected byte 0x{:02x} in frame length",
                b
            )));
        }
        if digits.len() == MAX_LENGTH_DIGITS {
            return Err(FtError::ProtocolViolation(
                "frame length field too long".to_string(),
            ));
        }
        digits.push(b as char);
    }
    if digits.is_empty() {
        return Err(FtError::ProtocolViolation("empty frame length".to_string()));
    }
    let len: usize = digits
        .parse()
        .map_err(|_| FtError::ProtocolViolation(format!("invalid frame length: {}", digits)))?;
    validate_frame_size(len)?;
    Ok(len)
}

/// Receive one frame's payload as raw bytes
pub fn recv_framed_bytes<R: Read + ?Sized>(stream: &mut R) -> Result<Vec<u8>> {
    let len = read_frame_header(stream)?;
    let mut payload = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match stream.read(&mut payload[filled..]) {
            Ok(0) => return Err(FtError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FtError::ReceiveFailed(e)),
        }
    }
    Ok(payload)
}

/// Receive one frame's payload as UTF-8 text
pub fn recv_framed_text<R: Read + ?Sized>(stream: &mut R) -> Result<String> {
    let payload = recv_framed_bytes(stream)?;
    String::from_utf8(payload)
        .map_err(|e| FtError::ProtocolViolation(format!("text frame is not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Reader that hands out at most `step` bytes per call
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_frame_header_format() {
        assert_eq!(build_frame_header(0), b"0@".to_vec());
        assert_eq!(build_frame_header(1234), b"1234@".to_vec());
        assert_eq!(build_frame(b"hi"), b"2@hi".to_vec());
    }

    #[test]
    fn test_send_text_writes_header_then_payload() {
        let mut out = Vec::new();
        send_text(&mut out, "DATA_PORT: 30020").unwrap();
        assert_eq!(out, b"16@DATA_PORT: 30020".to_vec());
    }

    #[test]
    fn test_round_trip_including_empty() {
        for payload in [Vec::new(), b"x".to_vec(), vec![0u8, 255, 64, 10, 13], vec![7u8; 70_000]] {
            let mut wire = Vec::new();
            send_frame(&mut wire, &payload).unwrap();
            let mut cur = Cursor::new(wire);
            assert_eq!(recv_framed_bytes(&mut cur).unwrap(), payload);
        }
    }

    #[test]
    fn test_zero_length_frame_does_not_consume_next_frame() {
        let mut wire = build_frame(b"");
        wire.extend_from_slice(&build_frame(b"next"));
        let mut cur = Cursor::new(wire);
        assert_eq!(recv_framed_text(&mut cur).unwrap(), "");
        assert_eq!(recv_framed_text(&mut cur).unwrap(), "next");
    }

    #[test]
    fn test_partial_reads_are_reassembled() {
        let mut r = Trickle {
            data: build_frame(b"SUCCESS! 1000 bytes sent over data connection."),
            pos: 0,
            step: 3,
        };
        assert_eq!(
            recv_framed_text(&mut r).unwrap(),
            "SUCCESS! 1000 bytes sent over data connection."
        );
    }

    #[test]
    fn test_reader_stops_at_frame_boundary() {
        let mut wire = build_frame(b"abc");
        wire.extend_from_slice(b"trailing");
        let mut cur = Cursor::new(wire);
        recv_framed_bytes(&mut cur).unwrap();
        assert_eq!(cur.position(), 5);
    }

    #[test]
    fn test_eof_before_terminator_is_connection_closed() {
        let mut cur = Cursor::new(b"12".to_vec());
        assert!(matches!(recv_framed_bytes(&mut cur), Err(FtError::ConnectionClosed)));
        let mut empty = Cursor::new(Vec::new());
        assert!(matches!(recv_framed_bytes(&mut empty), Err(FtError::ConnectionClosed)));
    }

    #[test]
    fn test_eof_mid_payload_is_connection_closed() {
        let mut cur = Cursor::new(b"10@short".to_vec());
        assert!(matches!(recv_framed_bytes(&mut cur), Err(FtError::ConnectionClosed)));
    }

    #[test]
    fn test_malformed_length_is_protocol_violation() {
        for wire in [&b"1x@abc"[..], b"@abc", b"-1@a"] {
            let mut cur = Cursor::new(wire.to_vec());
            assert!(
                matches!(recv_framed_bytes(&mut cur), Err(FtError::ProtocolViolation(_))),
                "{:?}",
                String::from_utf8_lossy(wire)
            );
        }
    }

    #[test]
    fn test_oversized_length_is_rejected() {
        let wire = format!("{}@", MAX_FRAME_SIZE + 1);
        let mut cur = Cursor::new(wire.into_bytes());
        assert!(matches!(recv_framed_bytes(&mut cur), Err(FtError::ProtocolViolation(_))));

        let mut cur = Cursor::new(b"123456789012345678901@".to_vec());
        assert!(matches!(recv_framed_bytes(&mut cur), Err(FtError::ProtocolViolation(_))));
    }

    #[test]
    fn test_invalid_utf8_text_frame() {
        let mut cur = Cursor::new(build_frame(&[0xff, 0xfe]));
        assert!(matches!(recv_framed_text(&mut cur), Err(FtError::ProtocolViolation(_))));
    }

    #[test]
    fn test_validate_frame_size_edge_cases() {
        assert!(validate_frame_size(0).is_ok());
        assert!(validate_frame_size(MAX_FRAME_SIZE).is_ok());
        assert!(validate_frame_size(MAX_FRAME_SIZE + 1).is_err());
        assert!(validate_frame_size(usize::MAX).is_err());
    }
}
