//! MS-SMB2 2.2.39: SET_INFO request.
//!
//! The proxy only cares about one case: `SMB2_0_INFO_FILE` carrying
//! `FileDispositionInformation`, which toggles delete-on-close for an
//! already-open file id (MS-FSCC 2.4.11). Anything else is forwarded with
//! only its `file_id` decoded, so the state machine can still attribute the
//! request to the right open.

use crate::body_relative_offset;
use binrw::io::{Read, Seek, SeekFrom};
use binrw::prelude::*;
use proxy_dtyp::{Boolean, FileId};

/// `SMB2_0_INFO_FILE`, the only info type the proxy acts on.
pub const SMB2_0_INFO_FILE: u8 = 0x01;

/// `FileDispositionInformation`, MS-FSCC 2.4.11.
pub const FILE_DISPOSITION_INFORMATION: u8 = 13;

/// `FileRenameInformation`, MS-FSCC 2.4.38. Not currently acted on; see the
/// design notes around cache invalidation on rename.
pub const FILE_RENAME_INFORMATION: u8 = 10;

#[derive(Debug, Clone)]
pub struct SetInfoRequest {
    pub info_type: u8,
    pub file_info_class: u8,
    pub file_id: FileId,
    /// `DeletePending`, populated only when this is a
    /// `FileDispositionInformation` request.
    pub delete_pending: Option<bool>,
}

impl BinRead for SetInfoRequest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let info_type = u8::read_options(reader, endian, ())?;
        let file_info_class = u8::read_options(reader, endian, ())?;
        let buffer_length = u32::read_options(reader, endian, ())?;
        let buffer_offset = u16::read_options(reader, endian, ())?;
        let _reserved = u16::read_options(reader, endian, ())?;
        let _additional_information = u32::read_options(reader, endian, ())?;
        let file_id = FileId::read_options(reader, endian, ())?;

        let delete_pending = if info_type == SMB2_0_INFO_FILE
            && file_info_class == FILE_DISPOSITION_INFORMATION
            && buffer_length >= 1
        {
            reader.seek(SeekFrom::Start(body_relative_offset(buffer_offset)))?;
            let flag = Boolean::read_options(reader, endian, ())?;
            Some(bool::from(flag))
        } else {
            None
        };

        Ok(SetInfoRequest {
            info_type,
            file_info_class,
            file_id,
            delete_pending,
        })
    }
}
