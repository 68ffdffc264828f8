//! MS-SMB2 2.2.9 / 2.2.10: TREE_CONNECT request and response.

use crate::body_relative_offset;
use binrw::io::{Read, Seek, SeekFrom};
use binrw::prelude::*;
use proxy_dtyp::WideString;

/// TREE_CONNECT request. Only the share path is of interest to the proxy.
#[derive(Debug, Clone)]
pub struct TreeConnectRequest {
    pub path: String,
}

impl BinRead for TreeConnectRequest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let _flags = u16::read_options(reader, endian, ())?;
        let path_offset = u16::read_options(reader, endian, ())?;
        let path_length = u16::read_options(reader, endian, ())?;

        reader.seek(SeekFrom::Start(body_relative_offset(path_offset)))?;
        let path = WideString::read_options(reader, endian, (path_length,))?;

        Ok(TreeConnectRequest {
            path: path.to_string(),
        })
    }
}

/// TREE_CONNECT response. The proxy only needs to know the request
/// succeeded; the share type/flags/capabilities are forwarded untouched.
#[derive(Debug, Clone)]
pub struct TreeConnectResponse {
    pub share_type: u8,
}

impl BinRead for TreeConnectResponse {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let share_type = u8::read_options(reader, endian, ())?;
        Ok(TreeConnectResponse { share_type })
    }
}
