use std::fmt;

use bytes::Bytes;

use crate::binary::BinaryCodec;
use crate::error::ProtocolError;
use crate::frames::{Request, Response};
use crate::json::JsonCodec;

/// An encode/decode strategy for the wire protocol.
///
/// Decoding is incremental: `Ok(None)` means the buffer holds only a partial
/// frame and the caller should read more bytes; `Ok(Some((frame, consumed)))`
/// tells the caller how far to advance its accumulation buffer. Errors are
/// fatal for the connection.
pub trait FrameCodec: Send + Sync {
    fn encode_request(&self, request: &Request) -> Bytes;

    fn encode_response(&self, response: &Response) -> Bytes;

    fn decode_request(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, ProtocolError>;

    fn decode_response(&self, buf: &[u8]) -> Result<Option<(Response, usize)>, ProtocolError>;
}

/// Which codec a process speaks. Selected once at startup and used for every
/// frame in both directions; both peers of a connection must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Binary,
    Json,
}

impl WireFormat {
    pub fn codec(self) -> &'static dyn FrameCodec {
        match self {
            Self::Binary => &BinaryCodec,
            Self::Json => &JsonCodec,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "binary" => Some(Self::Binary),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::Json => f.write_str("json"),
        }
    }
}
