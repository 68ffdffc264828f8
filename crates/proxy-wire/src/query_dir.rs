//! MS-SMB2 2.2.33: QUERY_DIRECTORY request.
//!
//! The proxy never inspects the returned listing bytes on the wire (it
//! builds its own cache-aware view out-of-band); it only needs the file id
//! the query is scoped to, to resolve it back to a tracked open.

use binrw::io::{Read, Seek};
use binrw::prelude::*;
use proxy_dtyp::FileId;

#[derive(Debug, Clone)]
pub struct QueryDirectoryRequest {
    pub file_id: FileId,
}

impl BinRead for QueryDirectoryRequest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let _file_information_class = u8::read_options(reader, endian, ())?;
        let _flags = u8::read_options(reader, endian, ())?;
        let _file_index = u32::read_options(reader, endian, ())?;
        let file_id = FileId::read_options(reader, endian, ())?;

        Ok(QueryDirectoryRequest { file_id })
    }
}
