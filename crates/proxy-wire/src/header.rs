//! The 64-byte SMB2 header, as described in MS-SMB2 2.2.1.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// SMB2 command codes. Only the five named in the proxy's interception list
/// (see [`crate::body::Body`]) get their payload parsed; everything else is
/// forwarded as opaque bytes.
#[binrw]
#[brw(repr(u16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Negotiate = 0x0000,
    SessionSetup = 0x0001,
    Logoff = 0x0002,
    TreeConnect = 0x0003,
    TreeDisconnect = 0x0004,
    Create = 0x0005,
    Close = 0x0006,
    Flush = 0x0007,
    Read = 0x0008,
    Write = 0x0009,
    Lock = 0x000a,
    Ioctl = 0x000b,
    Cancel = 0x000c,
    Echo = 0x000d,
    QueryDirectory = 0x000e,
    ChangeNotify = 0x000f,
    QueryInfo = 0x0010,
    SetInfo = 0x0011,
    OplockBreak = 0x0012,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Bit layout of the SMB2 header `Flags` field (MS-SMB2 2.2.1.2).
#[bitfield]
#[derive(BinRead, BinWrite, Debug, Clone, Copy)]
#[br(map = Self::from_bytes)]
#[bw(map = |&x| Self::into_bytes(x))]
pub struct HeaderFlags {
    pub server_to_redir: bool,
    pub async_command: bool,
    pub related_operations: bool,
    pub signed: bool,
    pub priority_mask: B3,
    #[skip]
    __: B21,
    pub dfs_operation: bool,
    pub replay_operation: bool,
    #[skip]
    __: B2,
}

/// The 64-byte SMB2 message header, sync or async variant.
///
/// The proxy only ever sees sync headers in practice (async replies belong
/// to long-running server-side operations that this interception layer does
/// not originate), but both are decoded so an unexpected async response
/// doesn't abort the parse.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub credit_charge: u16,
    pub status: u32,
    pub command: Command,
    pub credit_request_response: u16,
    pub flags: HeaderFlags,
    pub next_command: u32,
    pub message_id: u64,
    pub tree_id: u32,
    pub async_id: u64,
    pub session_id: u64,
}

impl Header {
    pub const STRUCT_SIZE: usize = 64;
    pub const MAGIC: [u8; 4] = *b"\xfeSMB";

    /// Parses a header at the current cursor position, which is assumed to
    /// point at the `\xfeSMB` magic.
    pub fn parse(reader: &mut std::io::Cursor<&[u8]>) -> BinResult<Header> {
        use binrw::Endian::Little;

        let magic = <[u8; 4]>::read_options(reader, Little, ())?;
        if magic != Self::MAGIC {
            return Err(binrw::Error::BadMagic {
                pos: reader.position() - 4,
                found: Box::new(magic),
            });
        }
        let structure_size = u16::read_options(reader, Little, ())?;
        let credit_charge = u16::read_options(reader, Little, ())?;
        let status = u32::read_options(reader, Little, ())?;
        let command = Command::read_options(reader, Little, ())?;
        let credit_request_response = u16::read_options(reader, Little, ())?;
        let flags = HeaderFlags::read_options(reader, Little, ())?;
        let next_command = u32::read_options(reader, Little, ())?;
        let message_id = u64::read_options(reader, Little, ())?;

        let (tree_id, async_id) = if flags.async_command() {
            let async_id = u64::read_options(reader, Little, ())?;
            (0, async_id)
        } else {
            let _process_id = u32::read_options(reader, Little, ())?;
            let tree_id = u32::read_options(reader, Little, ())?;
            (tree_id, 0)
        };

        let session_id = u64::read_options(reader, Little, ())?;
        let _signature = <[u8; 16]>::read_options(reader, Little, ())?;

        let _ = structure_size;

        Ok(Header {
            credit_charge,
            status,
            command,
            credit_request_response,
            flags,
            next_command,
            message_id,
            tree_id,
            async_id,
            session_id,
        })
    }

    /// `true` when this header belongs to a server response rather than a
    /// client request.
    pub fn is_response(&self) -> bool {
        self.flags.server_to_redir()
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a sync-variant 64-byte header from its fields, the way a real
    /// packet would lay them out, without hand-encoding a hex literal.
    fn build_sync_header(command: u16, flags: u32, message_id: u64, tree_id: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Header::STRUCT_SIZE);
        buf.extend_from_slice(&Header::MAGIC);
        buf.extend_from_slice(&64u16.to_le_bytes()); // structure_size
        buf.extend_from_slice(&0u16.to_le_bytes()); // credit_charge
        buf.extend_from_slice(&0u32.to_le_bytes()); // status
        buf.extend_from_slice(&command.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // credit_request_response
        buf.extend_from_slice(&flags.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // next_command
        buf.extend_from_slice(&message_id.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // process_id
        buf.extend_from_slice(&tree_id.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes()); // session_id
        buf.extend_from_slice(&[0u8; 16]); // signature
        assert_eq!(buf.len(), Header::STRUCT_SIZE);
        buf
    }

    #[test]
    fn parses_sync_header() {
        let bytes = build_sync_header(0x0003, 0, 5, 0);
        let mut cur = std::io::Cursor::new(bytes.as_slice());
        let hdr = Header::parse(&mut cur).unwrap();
        assert_eq!(hdr.command, Command::TreeConnect);
        assert!(!hdr.is_response());
        assert_eq!(hdr.message_id, 5);
        assert_eq!(cur.position() as usize, Header::STRUCT_SIZE);
    }

    #[test]
    fn response_flag_is_detected() {
        let bytes = build_sync_header(0x0005, 0x0000_0001, 9, 5);
        let mut cur = std::io::Cursor::new(bytes.as_slice());
        let hdr = Header::parse(&mut cur).unwrap();
        assert_eq!(hdr.command, Command::Create);
        assert!(hdr.is_response());
        assert_eq!(hdr.tree_id, 5);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_sync_header(0x0003, 0, 1, 0);
        bytes[0] = 0xff;
        let mut cur = std::io::Cursor::new(bytes.as_slice());
        assert!(Header::parse(&mut cur).is_err());
    }
}
