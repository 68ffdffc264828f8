#![forbid(unsafe_code)]

//! Direct-TCP framing and SMB2 decoding for the handful of commands the
//! interception proxy inspects: TREE_CONNECT, CREATE, QUERY_DIRECTORY,
//! SET_INFO and CLOSE. Every other command passes through as opaque bytes.
//!
//! This crate only ever reads the wire format; the proxy forwards the
//! original bytes it received verbatim, so there is no corresponding
//! encoder.

mod body;
mod close;
mod create;
mod framing;
mod header;
mod query_dir;
mod set_info;
mod tree_connect;

pub use body::Body;
pub use close::CloseRequest;
pub use create::{CreateRequest, CreateResponse, FileAccessMask, FILE_DELETE_ON_CLOSE};
pub use framing::{read_frame_header, walk_compound_chain, ChainedMessage, FramingError, MAX_FRAME_LEN};
pub use header::{Command, Header, HeaderFlags};
pub use query_dir::QueryDirectoryRequest;
pub use set_info::{
    SetInfoRequest, FILE_DISPOSITION_INFORMATION, FILE_RENAME_INFORMATION, SMB2_0_INFO_FILE,
};
pub use tree_connect::{TreeConnectRequest, TreeConnectResponse};

/// Rebases a variable-length field offset, which MS-SMB2 always defines
/// relative to the start of the 64-byte message header, to be relative to
/// the start of the body instead — the frame of reference every `BinRead`
/// impl in this crate reads from, since the header is parsed and consumed
/// separately before the body cursor is handed off.
pub(crate) fn body_relative_offset(header_relative_offset: u16) -> u64 {
    (header_relative_offset as u64).saturating_sub(Header::STRUCT_SIZE as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_relative_offset_subtracts_header_size() {
        assert_eq!(body_relative_offset(64 + 10), 10);
    }

    #[test]
    fn body_relative_offset_saturates_at_zero() {
        assert_eq!(body_relative_offset(0), 0);
    }
}
