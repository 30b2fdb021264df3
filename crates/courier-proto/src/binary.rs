//! Hand-rolled big-endian frame layout.
//!
//! ```text
//! [0]    Type code (u8, see MessageKind)
//! [1..]  Payload fields for that type, back to back:
//!          u32       4 bytes BE
//!          i32       4 bytes BE, two's complement
//!          bool      1 byte, 0x00 or 0x01
//!          string    u32 BE byte length + UTF-8 bytes
//!          string?   bool flag, then the string iff the flag is 1
//!          list<T>   u32 BE element count + elements back to back
//!          message   id u32 + sender u32 + content string
//! ```
//!
//! There is no outer length header. The decoder walks the fields of the
//! declared type and reports how many bytes the frame occupied; a buffer
//! that ends mid-field is a partial frame, not an error.

use bytes::Bytes;

use crate::codec::FrameCodec;
use crate::error::ProtocolError;
use crate::frames::{Message, MessageKind, Request, Response, UserSummary};

/// Sanity cap on string/list length prefixes (and on how far a connection
/// buffer may grow without producing a frame): 16 MB.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// The compact strategy. Stateless; both directions share one instance.
pub struct BinaryCodec;

impl FrameCodec for BinaryCodec {
    fn encode_request(&self, request: &Request) -> Bytes {
        let mut buf = vec![request.kind().code()];
        match request {
            Request::CreateAccount { name, password } | Request::Login { name, password } => {
                put_string(&mut buf, name);
                put_string(&mut buf, password);
            }
            Request::ListUsers {
                pattern,
                offset,
                limit,
            } => {
                put_string(&mut buf, pattern);
                put_u32(&mut buf, *offset);
                put_i32(&mut buf, *limit);
            }
            Request::GetUserFromId { user_id } => put_u32(&mut buf, *user_id),
            Request::SendMessage { receiver, content } => {
                put_u32(&mut buf, *receiver);
                put_string(&mut buf, content);
            }
            Request::PopUnreadMessages { num_messages } => put_i32(&mut buf, *num_messages),
            Request::GetReadMessages {
                offset,
                num_messages,
            } => {
                put_u32(&mut buf, *offset);
                put_i32(&mut buf, *num_messages);
            }
            Request::DeleteMessages { message_ids } => {
                put_u32(&mut buf, message_ids.len() as u32);
                for id in message_ids {
                    put_u32(&mut buf, *id);
                }
            }
            Request::DeleteAccount
            | Request::GetNumberOfUnreadMessages
            | Request::Logout => {}
        }
        buf.into()
    }

    fn encode_response(&self, response: &Response) -> Bytes {
        let mut buf = vec![response.kind().code()];
        match response {
            Response::CreateAccount { error }
            | Response::Login { error }
            | Response::SendMessage { error } => put_opt_string(&mut buf, error),
            Response::ListUsers { users } => {
                put_u32(&mut buf, users.len() as u32);
                for user in users {
                    put_u32(&mut buf, user.id);
                    put_string(&mut buf, &user.name);
                }
            }
            Response::GetUserFromId { name } => put_string(&mut buf, name),
            Response::ReceivedMessage { message } => put_message(&mut buf, message),
            Response::GetNumberOfUnreadMessages { count } => put_u32(&mut buf, *count),
            Response::PopUnreadMessages { messages }
            | Response::GetReadMessages { messages } => {
                put_u32(&mut buf, messages.len() as u32);
                for message in messages {
                    put_message(&mut buf, message);
                }
            }
            Response::Error { message } => put_string(&mut buf, message),
        }
        buf.into()
    }

    fn decode_request(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, ProtocolError> {
        let mut reader = Reader::new(buf);
        match read_request(&mut reader) {
            Ok(frame) => Ok(Some((frame, reader.pos))),
            Err(Fail::Incomplete) => Ok(None),
            Err(Fail::Bad(err)) => Err(err),
        }
    }

    fn decode_response(&self, buf: &[u8]) -> Result<Option<(Response, usize)>, ProtocolError> {
        let mut reader = Reader::new(buf);
        match read_response(&mut reader) {
            Ok(frame) => Ok(Some((frame, reader.pos))),
            Err(Fail::Incomplete) => Ok(None),
            Err(Fail::Bad(err)) => Err(err),
        }
    }
}

fn read_request(r: &mut Reader<'_>) -> Result<Request, Fail> {
    let code = r.u8()?;
    let kind = MessageKind::from_code(code).ok_or(ProtocolError::UnknownKind(code))?;
    let frame = match kind {
        MessageKind::CreateAccount => Request::CreateAccount {
            name: r.string()?,
            password: r.string()?,
        },
        MessageKind::Login => Request::Login {
            name: r.string()?,
            password: r.string()?,
        },
        MessageKind::ListUsers => Request::ListUsers {
            pattern: r.string()?,
            offset: r.u32()?,
            limit: r.i32()?,
        },
        MessageKind::GetUserFromId => Request::GetUserFromId { user_id: r.u32()? },
        MessageKind::DeleteAccount => Request::DeleteAccount,
        MessageKind::SendMessage => Request::SendMessage {
            receiver: r.u32()?,
            content: r.string()?,
        },
        MessageKind::GetNumberOfUnreadMessages => Request::GetNumberOfUnreadMessages,
        MessageKind::PopUnreadMessages => Request::PopUnreadMessages {
            num_messages: r.i32()?,
        },
        MessageKind::GetReadMessages => Request::GetReadMessages {
            offset: r.u32()?,
            num_messages: r.i32()?,
        },
        MessageKind::DeleteMessages => Request::DeleteMessages {
            message_ids: r.u32_list()?,
        },
        MessageKind::Logout => Request::Logout,
        other => return Err(ProtocolError::UnexpectedKind(other).into()),
    };
    Ok(frame)
}

fn read_response(r: &mut Reader<'_>) -> Result<Response, Fail> {
    let code = r.u8()?;
    let kind = MessageKind::from_code(code).ok_or(ProtocolError::UnknownKind(code))?;
    let frame = match kind {
        MessageKind::CreateAccount => Response::CreateAccount {
            error: r.opt_string()?,
        },
        MessageKind::Login => Response::Login {
            error: r.opt_string()?,
        },
        MessageKind::ListUsers => Response::ListUsers {
            users: r.user_list()?,
        },
        MessageKind::GetUserFromId => Response::GetUserFromId { name: r.string()? },
        MessageKind::SendMessage => Response::SendMessage {
            error: r.opt_string()?,
        },
        MessageKind::ReceivedMessage => Response::ReceivedMessage {
            message: r.message()?,
        },
        MessageKind::GetNumberOfUnreadMessages => Response::GetNumberOfUnreadMessages {
            count: r.u32()?,
        },
        MessageKind::PopUnreadMessages => Response::PopUnreadMessages {
            messages: r.message_list()?,
        },
        MessageKind::GetReadMessages => Response::GetReadMessages {
            messages: r.message_list()?,
        },
        MessageKind::Error => Response::Error {
            message: r.string()?,
        },
        other => return Err(ProtocolError::UnexpectedKind(other).into()),
    };
    Ok(frame)
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    put_u32(buf, value as u32);
}

fn put_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(value as u8);
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_u32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}

fn put_opt_string(buf: &mut Vec<u8>, value: &Option<String>) {
    match value {
        Some(s) => {
            put_bool(buf, true);
            put_string(buf, s);
        }
        None => put_bool(buf, false),
    }
}

fn put_message(buf: &mut Vec<u8>, message: &Message) {
    put_u32(buf, message.id);
    put_u32(buf, message.sender);
    put_string(buf, &message.content);
}

/// Why a field read stopped. `Incomplete` surfaces as `Ok(None)` at the
/// codec boundary so the caller keeps the buffer and reads more.
enum Fail {
    Incomplete,
    Bad(ProtocolError),
}

impl From<ProtocolError> for Fail {
    fn from(err: ProtocolError) -> Self {
        Self::Bad(err)
    }
}

/// Cursor over the accumulation buffer. `pos` only advances on successful
/// reads, so after a full frame it equals the frame's byte length.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Fail> {
        if self.buf.len() - self.pos < n {
            return Err(Fail::Incomplete);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, Fail> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, Fail> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, Fail> {
        Ok(self.u32()? as i32)
    }

    fn bool(&mut self) -> Result<bool, Fail> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidBool(other).into()),
        }
    }

    /// Length prefix for strings and lists. Rejected past `MAX_FRAME_LEN`,
    /// otherwise a corrupt prefix would park the connection waiting for
    /// gigabytes that never arrive.
    fn len(&mut self) -> Result<usize, Fail> {
        let len = self.u32()? as usize;
        if len > MAX_FRAME_LEN {
            return Err(ProtocolError::FrameTooLarge {
                len,
                limit: MAX_FRAME_LEN,
            }
            .into());
        }
        Ok(len)
    }

    fn string(&mut self) -> Result<String, Fail> {
        let len = self.len()?;
        match std::str::from_utf8(self.take(len)?) {
            Ok(s) => Ok(s.to_owned()),
            Err(_) => Err(ProtocolError::InvalidUtf8.into()),
        }
    }

    fn opt_string(&mut self) -> Result<Option<String>, Fail> {
        if self.bool()? {
            Ok(Some(self.string()?))
        } else {
            Ok(None)
        }
    }

    fn message(&mut self) -> Result<Message, Fail> {
        Ok(Message {
            id: self.u32()?,
            sender: self.u32()?,
            content: self.string()?,
        })
    }

    // Element counts are sanity-checked but still untrusted: reserve
    // conservatively and let `take` fail on short buffers.

    fn u32_list(&mut self) -> Result<Vec<u32>, Fail> {
        let count = self.len()?;
        let mut out = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            out.push(self.u32()?);
        }
        Ok(out)
    }

    fn message_list(&mut self) -> Result<Vec<Message>, Fail> {
        let count = self.len()?;
        let mut out = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            out.push(self.message()?);
        }
        Ok(out)
    }

    fn user_list(&mut self) -> Result<Vec<UserSummary>, Fail> {
        let count = self.len()?;
        let mut out = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            out.push(UserSummary {
                id: self.u32()?,
                name: self.string()?,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_layout_is_stable() {
        let frame = BinaryCodec.encode_request(&Request::SendMessage {
            receiver: 7,
            content: "hi".into(),
        });
        // code 6, receiver BE, length BE, bytes
        assert_eq!(&frame[..], &[6, 0, 0, 0, 7, 0, 0, 0, 2, b'h', b'i']);
    }

    #[test]
    fn response_wire_layout_is_stable() {
        let ok = BinaryCodec.encode_response(&Response::Login { error: None });
        assert_eq!(&ok[..], &[2, 0]);

        let failed = BinaryCodec.encode_response(&Response::Login {
            error: Some("no".into()),
        });
        assert_eq!(&failed[..], &[2, 1, 0, 0, 0, 2, b'n', b'o']);
    }

    #[test]
    fn negative_counts_survive_the_u32_field() {
        let frame = BinaryCodec.encode_request(&Request::PopUnreadMessages { num_messages: -1 });
        assert_eq!(&frame[..], &[9, 0xff, 0xff, 0xff, 0xff]);

        let (decoded, _) = BinaryCodec.decode_request(&frame).unwrap().unwrap();
        assert_eq!(decoded, Request::PopUnreadMessages { num_messages: -1 });
    }

    #[test]
    fn fieldless_frames_are_one_byte() {
        for request in [
            Request::DeleteAccount,
            Request::GetNumberOfUnreadMessages,
            Request::Logout,
        ] {
            let frame = BinaryCodec.encode_request(&request);
            assert_eq!(frame.len(), 1);
            let (decoded, consumed) = BinaryCodec.decode_request(&frame).unwrap().unwrap();
            assert_eq!(decoded, request);
            assert_eq!(consumed, 1);
        }
    }

    #[test]
    fn empty_buffer_is_incomplete() {
        assert!(BinaryCodec.decode_request(&[]).unwrap().is_none());
        assert!(BinaryCodec.decode_response(&[]).unwrap().is_none());
    }

    #[test]
    fn reject_unknown_type_code() {
        let err = BinaryCodec.decode_request(&[0xAA]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownKind(0xAA)));
    }

    #[test]
    fn reject_zero_type_code() {
        let err = BinaryCodec.decode_request(&[0]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownKind(0)));
    }

    #[test]
    fn reject_response_code_on_request_side() {
        // 13 is the error frame, which clients never send.
        let err = BinaryCodec.decode_request(&[13]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedKind(MessageKind::Error)
        ));
    }

    #[test]
    fn reject_request_code_on_response_side() {
        // 5 (delete account) has no response shape.
        let err = BinaryCodec.decode_response(&[5]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedKind(MessageKind::DeleteAccount)
        ));
    }

    #[test]
    fn reject_bad_bool_byte() {
        // Login response with flag byte 2.
        let err = BinaryCodec.decode_response(&[2, 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidBool(2)));
    }

    #[test]
    fn reject_invalid_utf8_in_string() {
        let mut frame = vec![13];
        put_u32(&mut frame, 2);
        frame.extend_from_slice(&[0xC3, 0x28]);
        let err = BinaryCodec.decode_response(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8));
    }

    #[test]
    fn reject_oversized_length_prefix() {
        let mut frame = vec![13];
        put_u32(&mut frame, u32::MAX);
        let err = BinaryCodec.decode_response(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[test]
    fn truncated_string_is_incomplete_not_error() {
        // Error frame declaring 5 bytes but carrying 3.
        let mut frame = vec![13];
        put_u32(&mut frame, 5);
        frame.extend_from_slice(b"abc");
        assert!(BinaryCodec.decode_response(&frame).unwrap().is_none());
    }

    #[test]
    fn truncated_list_is_incomplete_not_error() {
        // Pop response declaring two messages but carrying one.
        let mut frame = vec![9];
        put_u32(&mut frame, 2);
        put_message(
            &mut frame,
            &Message {
                id: 1,
                sender: 2,
                content: "x".into(),
            },
        );
        assert!(BinaryCodec.decode_response(&frame).unwrap().is_none());
    }

    #[test]
    fn consumed_count_stops_at_frame_boundary() {
        let mut buf = Vec::new();
        let first = Request::GetUserFromId { user_id: 42 };
        buf.extend_from_slice(&BinaryCodec.encode_request(&first));
        let trailing_garbage = [0xDE, 0xAD];
        buf.extend_from_slice(&trailing_garbage);

        let (decoded, consumed) = BinaryCodec.decode_request(&buf).unwrap().unwrap();
        assert_eq!(decoded, first);
        assert_eq!(consumed, buf.len() - trailing_garbage.len());
    }
}
