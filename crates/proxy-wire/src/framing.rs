//! Direct-TCP transport framing (MS-SMB2 2.1) and SMB2 compound-message
//! chain walking (MS-SMB2 3.3.5.2.7 and friends).

use crate::header::Header;
use thiserror::Error;

/// Maximum Direct-TCP payload length the proxy accepts. MS-SMB2 caps the
/// 3-byte length field at 0x00ffffff; this is a defensive upper bound well
/// below that, matched to the largest compound message any of the five
/// intercepted commands plausibly produces.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),
    #[error("truncated Direct-TCP header")]
    TruncatedHeader,
}

/// Attempts to split one Direct-TCP frame off the front of `buf`.
///
/// Returns `Some((payload_len, header_len))` when a complete frame header
/// (and the length it declares) is available; the caller is responsible for
/// waiting on more bytes before slicing the payload out when the full frame
/// hasn't arrived yet. Returns `None` when `buf` doesn't yet hold the
/// 4-byte Direct-TCP header.
pub fn read_frame_header(buf: &[u8]) -> Result<Option<usize>, FramingError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    // byte 0 is the Direct-TCP message type; SMB2/SMB1 over TCP always uses
    // 0x00 (`SMB2_MESSAGE`). Anything else is outside what this proxy
    // forwards.
    let len = ((buf[1] as usize) << 16) | ((buf[2] as usize) << 8) | (buf[3] as usize);
    if len > MAX_FRAME_LEN {
        return Err(FramingError::FrameTooLarge(len));
    }
    Ok(Some(len))
}

/// One decoded message within a (possibly compound) Direct-TCP frame: its
/// header and the body bytes that follow it, up to the next chained
/// message or the end of the frame.
pub struct ChainedMessage<'a> {
    pub header: Header,
    pub body: &'a [u8],
}

/// Walks the compound chain inside one Direct-TCP frame payload, yielding
/// each message's header and body slice in order.
///
/// SMB1 negotiate packets (`\xffSMB` magic) are never chained and carry no
/// SMB2 header the proxy can parse; callers should check for that magic
/// themselves before calling this and pass such frames straight through.
pub fn walk_compound_chain(payload: &[u8]) -> Vec<ChainedMessage<'_>> {
    let mut messages = Vec::new();
    let mut offset = 0usize;

    while offset < payload.len() {
        let remaining = &payload[offset..];
        let mut cursor = std::io::Cursor::new(remaining);
        let header = match Header::parse(&mut cursor) {
            Ok(h) => h,
            Err(_) => break,
        };

        let next_command = header.next_command as usize;
        let body_end = if next_command == 0 {
            remaining.len()
        } else {
            next_command.min(remaining.len())
        };
        let body_start = Header::STRUCT_SIZE.min(body_end);
        let body = &remaining[body_start..body_end];

        messages.push(ChainedMessage { header, body });

        if next_command == 0 || next_command <= body_start {
            break;
        }
        offset += next_command;
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_header(len: usize) -> [u8; 4] {
        let len = len as u32;
        [0, (len >> 16) as u8, (len >> 8) as u8, len as u8]
    }

    #[test]
    fn reads_declared_length() {
        let hdr = frame_header(300);
        assert_eq!(read_frame_header(&hdr).unwrap(), Some(300));
    }

    #[test]
    fn incomplete_header_is_none() {
        assert_eq!(read_frame_header(&[0, 0]).unwrap(), None);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let hdr = frame_header(MAX_FRAME_LEN + 1);
        assert!(read_frame_header(&hdr).is_err());
    }
}
