//! Decodes the body of a single SMB2 message into the subset of structures
//! the proxy inspects, keyed by command and direction. Everything else is
//! kept as an opaque byte slice and forwarded untouched.

use crate::close::CloseRequest;
use crate::create::{CreateRequest, CreateResponse};
use crate::header::{Command, Header};
use crate::query_dir::QueryDirectoryRequest;
use crate::set_info::SetInfoRequest;
use crate::tree_connect::{TreeConnectRequest, TreeConnectResponse};
use binrw::prelude::*;

/// The decoded body of one SMB2 message, or `Opaque` when the command isn't
/// one the proxy inspects (or when the header reported a non-success status
/// for a response, whose body shape the proxy doesn't rely on).
#[derive(Debug, Clone)]
pub enum Body {
    TreeConnectRequest(TreeConnectRequest),
    TreeConnectResponse(TreeConnectResponse),
    CreateRequest(CreateRequest),
    CreateResponse(CreateResponse),
    QueryDirectoryRequest(QueryDirectoryRequest),
    SetInfoRequest(SetInfoRequest),
    CloseRequest(CloseRequest),
    Opaque,
}

impl Body {
    /// Decodes `bytes` (the message body, i.e. everything past the 64-byte
    /// header) according to `header.command` and whether `header` is a
    /// response. Decode failures are swallowed to `Opaque` rather than
    /// propagated: a malformed or unexpectedly-shaped body must never stop
    /// the proxy from forwarding the packet, since the proxy isn't the
    /// protocol's authority.
    pub fn decode(header: &Header, bytes: &[u8]) -> Body {
        if header.is_response() && !header.is_success() {
            return Body::Opaque;
        }

        let mut cursor = std::io::Cursor::new(bytes);
        let endian = binrw::Endian::Little;

        let decoded = match (header.command, header.is_response()) {
            (Command::TreeConnect, false) => {
                TreeConnectRequest::read_options(&mut cursor, endian, ())
                    .map(Body::TreeConnectRequest)
            }
            (Command::TreeConnect, true) => {
                TreeConnectResponse::read_options(&mut cursor, endian, ())
                    .map(Body::TreeConnectResponse)
            }
            (Command::Create, false) => {
                CreateRequest::read_options(&mut cursor, endian, ()).map(Body::CreateRequest)
            }
            (Command::Create, true) => {
                CreateResponse::read_options(&mut cursor, endian, ()).map(Body::CreateResponse)
            }
            (Command::QueryDirectory, false) => {
                QueryDirectoryRequest::read_options(&mut cursor, endian, ())
                    .map(Body::QueryDirectoryRequest)
            }
            (Command::SetInfo, false) => {
                SetInfoRequest::read_options(&mut cursor, endian, ()).map(Body::SetInfoRequest)
            }
            (Command::Close, false) => {
                CloseRequest::read_options(&mut cursor, endian, ()).map(Body::CloseRequest)
            }
            _ => return Body::Opaque,
        };

        decoded.unwrap_or(Body::Opaque)
    }
}
