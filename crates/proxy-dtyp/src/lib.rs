#![forbid(unsafe_code)]

//! Shared wire-level data types used by [`proxy-wire`](../proxy_wire/index.html)
//! to decode the handful of SMB2 structures the interception proxy inspects.

mod boolean;
mod file_id;
mod wide_string;

pub use boolean::Boolean;
pub use file_id::FileId;
pub use wide_string::WideString;
