//! MS-SMB2 2.2.13 / 2.2.14: CREATE request and response.
//!
//! The proxy only cares about the fields it needs to decide whether to
//! sync/touch a file and, on the response, which file id that decision is
//! now bound to. Create contexts are opaque and forwarded untouched.

use crate::body_relative_offset;
use binrw::io::{Read, Seek, SeekFrom};
use binrw::prelude::*;
use proxy_dtyp::{FileId, WideString};

/// MS-SMB2 2.2.13.1: desired access bits relevant to deciding whether an
/// open is a write. Backed by the raw `u32` mask; only the bits the proxy
/// cares about are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAccessMask(pub u32);

/// MS-SMB2 2.2.13: CreateOptions bit relevant to the proxy.
pub const FILE_DELETE_ON_CLOSE: u32 = 0x0000_1000;

impl FileAccessMask {
    pub const FILE_WRITE_DATA: u32 = 0x0000_0002;
    pub const FILE_APPEND_DATA: u32 = 0x0000_0004;
    pub const FILE_WRITE_ATTRIBUTES: u32 = 0x0000_0100;
    pub const MAXIMUM_ALLOWED: u32 = 0x0200_0000;
    pub const GENERIC_ALL: u32 = 0x1000_0000;
    pub const GENERIC_WRITE: u32 = 0x4000_0000;

    /// `do_write` per the proxy's CREATE handling: true whenever the access
    /// mask grants any of the write-capable rights.
    pub fn implies_write(self) -> bool {
        let write_mask = Self::FILE_WRITE_DATA
            | Self::FILE_APPEND_DATA
            | Self::FILE_WRITE_ATTRIBUTES
            | Self::MAXIMUM_ALLOWED
            | Self::GENERIC_ALL
            | Self::GENERIC_WRITE;
        self.0 & write_mask != 0
    }
}

/// The fields of a CREATE request the proxy needs: the desired access mask,
/// the delete-on-close option bit, and the target filename.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub desired_access: FileAccessMask,
    pub delete_on_close: bool,
    pub name: String,
}

impl BinRead for CreateRequest {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let _security_flags = u8::read_options(reader, endian, ())?;
        let _requested_oplock_level = u8::read_options(reader, endian, ())?;
        let _impersonation_level = u32::read_options(reader, endian, ())?;
        let _smb_create_flags = u64::read_options(reader, endian, ())?;
        let _reserved = u64::read_options(reader, endian, ())?;
        let desired_access = u32::read_options(reader, endian, ())?;
        let _file_attributes = u32::read_options(reader, endian, ())?;
        let _share_access = u32::read_options(reader, endian, ())?;
        let _create_disposition = u32::read_options(reader, endian, ())?;
        let create_options = u32::read_options(reader, endian, ())?;
        let name_offset = u16::read_options(reader, endian, ())?;
        let name_length = u16::read_options(reader, endian, ())?;
        let _create_contexts_offset = u32::read_options(reader, endian, ())?;
        let _create_contexts_length = u32::read_options(reader, endian, ())?;

        let name = if name_length == 0 {
            WideString::default()
        } else {
            reader.seek(SeekFrom::Start(body_relative_offset(name_offset)))?;
            WideString::read_options(reader, endian, (name_length,))?
        };

        Ok(CreateRequest {
            desired_access: FileAccessMask(desired_access),
            delete_on_close: create_options & FILE_DELETE_ON_CLOSE != 0,
            name: name.to_string(),
        })
    }
}

/// The fields of a CREATE response the proxy needs: the resulting file id
/// (only meaningful when the header status is success).
#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub file_id: FileId,
}

impl BinRead for CreateResponse {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let _structure_size = u16::read_options(reader, endian, ())?;
        let _oplock_level = u8::read_options(reader, endian, ())?;
        let _flags = u8::read_options(reader, endian, ())?;
        let _create_action = u32::read_options(reader, endian, ())?;
        let _creation_time = u64::read_options(reader, endian, ())?;
        let _last_access_time = u64::read_options(reader, endian, ())?;
        let _last_write_time = u64::read_options(reader, endian, ())?;
        let _change_time = u64::read_options(reader, endian, ())?;
        let _allocation_size = u64::read_options(reader, endian, ())?;
        let _endof_file = u64::read_options(reader, endian, ())?;
        let _file_attributes = u32::read_options(reader, endian, ())?;
        let _reserved = u32::read_options(reader, endian, ())?;
        let file_id = FileId::read_options(reader, endian, ())?;

        Ok(CreateResponse { file_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_mask_detected() {
        let m = FileAccessMask(FileAccessMask::GENERIC_WRITE);
        assert!(m.implies_write());
        let m = FileAccessMask(0x0012_0089); // GENERIC_READ-ish, no write bits
        assert!(!m.implies_write());
    }
}
