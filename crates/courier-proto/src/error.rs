use thiserror::Error;

use crate::frames::MessageKind;

/// Decode failures. Any of these on a live connection means the peer is
/// broken or hostile, so callers should drop the connection rather than
/// attempt to resynchronize mid-stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message type code {0}")]
    UnknownKind(u8),

    #[error("unexpected {0:?} frame for this direction")]
    UnexpectedKind(MessageKind),

    #[error("frame length {len} exceeds limit of {limit} bytes")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
}
