//! [`Boolean`] implementation for binrw.

use binrw::{Endian, prelude::*};
use std::io::{Read, Seek, Write};

/// A one-byte boolean as defined by MS-FSCC 2.1.8. Any non-zero value reads as `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boolean(bool);

impl BinRead for Boolean {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let value: u8 = u8::read_options(reader, Endian::Little, ())?;
        Ok(Boolean(value != 0))
    }
}

impl BinWrite for Boolean {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        let value: u8 = if self.0 { 1 } else { 0 };
        value.write_options(writer, Endian::Little, ())
    }
}

impl From<bool> for Boolean {
    fn from(value: bool) -> Self {
        Boolean(value)
    }
}

impl From<Boolean> for bool {
    fn from(val: Boolean) -> Self {
        val.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_nonzero_as_true() {
        let mut c = Cursor::new([0x17u8]);
        let b = Boolean::read_le(&mut c).unwrap();
        assert!(bool::from(b));
    }

    #[test]
    fn reads_zero_as_false() {
        let mut c = Cursor::new([0x00u8]);
        let b = Boolean::read_le(&mut c).unwrap();
        assert!(!bool::from(b));
    }
}
