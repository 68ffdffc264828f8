//! MS-SMB2 2.2.15: CLOSE request.

use binrw::io::{Read, Seek};
use binrw::prelude::*;
use proxy_dtyp::FileId;

#[derive(Debug, Clone)]
pub struct CloseRequest {
    pub file_id: FileId,
}

impl BinRead for CloseRequest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let _flags = u16::read_options(reader, endian, ())?;
        let _reserved = u32::read_options(reader, endian, ())?;
        let file_id = FileId::read_options(reader, endian, ())?;

        Ok(CloseRequest { file_id })
    }
}
