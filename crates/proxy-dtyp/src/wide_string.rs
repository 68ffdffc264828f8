//! A UTF-16LE string whose byte length is known up front (from a preceding
//! length field), the way SMB2 variable-length name buffers are encoded.

use binrw::{BinResult, Endian, prelude::*};
use std::fmt;
use std::io::{Read, Seek};

/// A UTF-16LE encoded string, parsed from a caller-supplied byte length.
///
/// Unpaired surrogates and other invalid sequences are replaced per
/// [`String::from_utf16_lossy`] rather than failing the parse -- malformed
/// names should not bring down the proxy's inspection of an otherwise valid
/// packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WideString(pub String);

impl WideString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<WideString> for String {
    fn from(value: WideString) -> Self {
        value.0
    }
}

impl BinRead for WideString {
    /// Length of the buffer to read, in bytes (must be even).
    type Args<'a> = (u16,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let (byte_len,) = args;
        let count = (byte_len / 2) as usize;
        let mut units = vec![0u16; count];
        for unit in units.iter_mut() {
            *unit = u16::read_options(reader, Endian::Little, ())?;
        }
        Ok(WideString(String::from_utf16_lossy(&units)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_ascii_subset() {
        let bytes: Vec<u8> = "hi".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut c = Cursor::new(bytes);
        let s = WideString::read_le_args(&mut c, (4,)).unwrap();
        assert_eq!(s.as_str(), "hi");
    }
}
