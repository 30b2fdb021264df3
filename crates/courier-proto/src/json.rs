//! serde_json strategy. Each frame is one adjacently tagged object,
//! `{"type": "...", "data": {...}}`, followed by a newline so captures read
//! line per frame. The decoder does not require the newline; any buffer
//! holding a complete object yields a frame.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::FrameCodec;
use crate::error::ProtocolError;
use crate::frames::{Request, Response};

/// The debuggable strategy. Stateless, like its binary sibling.
pub struct JsonCodec;

impl FrameCodec for JsonCodec {
    fn encode_request(&self, request: &Request) -> Bytes {
        encode(request)
    }

    fn encode_response(&self, response: &Response) -> Bytes {
        encode(response)
    }

    fn decode_request(&self, buf: &[u8]) -> Result<Option<(Request, usize)>, ProtocolError> {
        decode(buf)
    }

    fn decode_response(&self, buf: &[u8]) -> Result<Option<(Response, usize)>, ProtocolError> {
        decode(buf)
    }
}

fn encode<T: Serialize>(frame: &T) -> Bytes {
    // Catalogue types have no map keys or non-UTF-8 content, so
    // serialization cannot fail.
    let mut buf = serde_json::to_vec(frame).expect("frame serializes");
    buf.push(b'\n');
    buf.into()
}

fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<Option<(T, usize)>, ProtocolError> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<T>();
    match stream.next() {
        Some(Ok(frame)) => {
            let mut consumed = stream.byte_offset();
            // Swallow our own trailing newline so the caller's buffer
            // advances past the whole line.
            if buf.get(consumed) == Some(&b'\n') {
                consumed += 1;
            }
            Ok(Some((frame, consumed)))
        }
        // EOF mid-value is a partial frame, anything else is garbage.
        Some(Err(err)) if err.is_eof() => Ok(None),
        Some(Err(err)) => Err(err.into()),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_text_is_stable() {
        let frame = JsonCodec.encode_request(&Request::GetUserFromId { user_id: 3 });
        assert_eq!(
            std::str::from_utf8(&frame).unwrap(),
            "{\"type\":\"get_user_from_id\",\"data\":{\"user_id\":3}}\n"
        );
    }

    #[test]
    fn fieldless_request_is_tag_only() {
        let frame = JsonCodec.encode_request(&Request::Logout);
        assert_eq!(&frame[..], b"{\"type\":\"logout\"}\n");

        let (decoded, consumed) = JsonCodec.decode_request(&frame).unwrap().unwrap();
        assert_eq!(decoded, Request::Logout);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn decodes_without_trailing_newline() {
        let body = br#"{"type":"login","data":{"name":"alice","password":"pw"}}"#;
        let (decoded, consumed) = JsonCodec.decode_request(body).unwrap().unwrap();
        assert_eq!(
            decoded,
            Request::Login {
                name: "alice".into(),
                password: "pw".into(),
            }
        );
        assert_eq!(consumed, body.len());
    }

    #[test]
    fn leading_whitespace_is_skipped() {
        let buf = b"\n  {\"type\":\"logout\"}\n";
        let (decoded, consumed) = JsonCodec.decode_request(buf).unwrap().unwrap();
        assert_eq!(decoded, Request::Logout);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn partial_object_is_incomplete() {
        let frame = JsonCodec.encode_request(&Request::CreateAccount {
            name: "bob".into(),
            password: "pw".into(),
        });
        assert!(JsonCodec.decode_request(&frame[..10]).unwrap().is_none());
    }

    #[test]
    fn reject_malformed_json() {
        assert!(JsonCodec.decode_request(b"{]").is_err());
    }

    #[test]
    fn reject_unknown_tag() {
        let buf = b"{\"type\":\"fly_to_moon\",\"data\":null}\n";
        assert!(matches!(
            JsonCodec.decode_request(buf),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn reject_request_tag_on_response_side() {
        let buf = b"{\"type\":\"logout\"}\n";
        assert!(JsonCodec.decode_response(buf).is_err());
    }

    #[test]
    fn empty_and_blank_buffers_are_incomplete() {
        assert!(JsonCodec.decode_request(b"").unwrap().is_none());
        assert!(JsonCodec.decode_request(b"  \n").unwrap().is_none());
    }
}
