//! MS-SMB2 2.2.14.1: SMB2_FILEID

use std::fmt::{self, Debug, Display};
use std::io::Cursor;

/// 128-bit file handle identifier used to key open-file state.
#[binrw::binrw]
#[derive(PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct FileId {
    pub persistent: u64,
    pub volatile: u64,
}

impl FileId {
    pub const EMPTY: FileId = FileId {
        persistent: 0,
        volatile: 0,
    };

    /// All bits set: the compound-request sentinel meaning "reuse the file
    /// opened earlier in this chain" (MS-SMB2 3.3.5.2.11).
    pub const FULL: FileId = FileId {
        persistent: u64::MAX,
        volatile: u64::MAX,
    };
}

impl From<[u8; 16]> for FileId {
    fn from(data: [u8; 16]) -> Self {
        let mut cursor = Cursor::new(data);
        binrw::BinRead::read_le(&mut cursor).unwrap()
    }
}

impl Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:016x}|{:016x}}}", self.persistent, self.volatile)
    }
}

impl Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_is_all_ones() {
        assert_eq!(FileId::FULL.persistent, u64::MAX);
        assert_eq!(FileId::FULL.volatile, u64::MAX);
    }

    #[test]
    fn from_bytes_roundtrip() {
        let bytes: [u8; 16] = [
            0x14, 0x04, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x51, 0x00, 0x10, 0x00, 0x0c, 0x00,
            0x00, 0x00,
        ];
        let id = FileId::from(bytes);
        assert_eq!(id.persistent, 0x0000_000c_0000_0414);
    }
}
