//! Courier wire protocol: the message schema and two interchangeable frame
//! codecs.
//!
//! The schema ([`Request`], [`Response`], [`Message`]) is plain data; how it
//! travels is decided once at process start by picking a [`WireFormat`]:
//! - [`BinaryCodec`]: compact length-prefixed binary frames
//! - [`JsonCodec`]: one self-describing JSON record per frame
//!
//! Both codecs decode incrementally from an accumulation buffer and report
//! how many bytes each frame consumed, so a single socket read may carry a
//! partial frame or several concatenated ones.

pub mod binary;
pub mod codec;
pub mod error;
pub mod frames;
pub mod json;

pub use binary::{BinaryCodec, MAX_FRAME_LEN};
pub use codec::{FrameCodec, WireFormat};
pub use error::ProtocolError;
pub use frames::{Message, MessageId, MessageKind, Request, Response, UserId, UserSummary};
pub use json::JsonCodec;
