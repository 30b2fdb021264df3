//! Async client for the courier chat protocol.
//!
//! One method per operation; the wire format is picked at [`connect`] time
//! and hidden behind the same codec abstraction the server uses. A reader
//! task decodes client-bound frames and routes them onto two queues:
//! unsolicited RECEIVED_MESSAGE pushes land on the push queue, everything
//! else on the response queue. The server answers a connection's requests in
//! order, so awaiting the next response after a write is sound even while
//! pushes interleave.
//!
//! The fire-and-forget requests are the one wrinkle: from an anonymous
//! session the server answers even those with an ERROR frame, which nothing
//! would await. The client mirrors its session's login state and refuses
//! them locally while logged out, keeping the pairing intact.
//!
//! [`connect`]: ChatClient::connect

use bytes::{Buf, BytesMut};
use courier_proto::{
    FrameCodec, Message, MessageId, MessageKind, Request, Response, UserId, UserSummary,
    WireFormat, MAX_FRAME_LEN,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server reported a failure, either in-band or as an ERROR frame.
    #[error("server error: {0}")]
    Server(String),

    /// The connection closed while a response was expected.
    #[error("connection closed")]
    Closed,

    /// The server answered with a frame of the wrong type.
    #[error("unexpected {0:?} response")]
    Unexpected(MessageKind),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct ChatClient {
    writer: OwnedWriteHalf,
    codec: &'static dyn FrameCodec,
    // Mirror of the server-side session auth, which changes only through
    // this connection's own frames.
    authenticated: bool,
    responses: mpsc::UnboundedReceiver<Response>,
    pushes: mpsc::UnboundedReceiver<Message>,
}

impl ChatClient {
    /// Connect and spawn the reader task. `format` must match the server's;
    /// there is no negotiation on the wire.
    pub async fn connect(addr: &str, format: WireFormat) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let codec = format.codec();
        let (reader, writer) = stream.into_split();
        let (response_tx, responses) = mpsc::unbounded_channel();
        let (push_tx, pushes) = mpsc::unbounded_channel();
        tokio::spawn(read_loop(reader, codec, response_tx, push_tx));
        Ok(Self {
            writer,
            codec,
            authenticated: false,
            responses,
            pushes,
        })
    }

    // -- Accounts --

    pub async fn create_account(&mut self, name: &str, password: &str) -> Result<(), ClientError> {
        self.send(&Request::CreateAccount {
            name: name.into(),
            password: password.into(),
        })
        .await?;
        match self.recv().await? {
            Response::CreateAccount { error: None } => Ok(()),
            Response::CreateAccount { error: Some(e) } => Err(ClientError::Server(e)),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    pub async fn login(&mut self, name: &str, password: &str) -> Result<(), ClientError> {
        self.send(&Request::Login {
            name: name.into(),
            password: password.into(),
        })
        .await?;
        match self.recv().await? {
            Response::Login { error: None } => {
                self.authenticated = true;
                Ok(())
            }
            Response::Login { error: Some(e) } => Err(ClientError::Server(e)),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    /// Fire-and-forget; the session is anonymous once the frame is written.
    /// While already logged out this refuses locally instead of writing.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.fire(Request::Logout).await?;
        self.authenticated = false;
        Ok(())
    }

    /// Fire-and-forget. The account is gone; the connection stays usable
    /// (and anonymous). Refuses locally while logged out.
    pub async fn delete_account(&mut self) -> Result<(), ClientError> {
        self.fire(Request::DeleteAccount).await?;
        self.authenticated = false;
        Ok(())
    }

    pub async fn list_users(
        &mut self,
        pattern: &str,
        offset: u32,
        limit: i32,
    ) -> Result<Vec<UserSummary>, ClientError> {
        self.send(&Request::ListUsers {
            pattern: pattern.into(),
            offset,
            limit,
        })
        .await?;
        match self.recv().await? {
            Response::ListUsers { users } => Ok(users),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    pub async fn get_user_from_id(&mut self, user_id: UserId) -> Result<String, ClientError> {
        self.send(&Request::GetUserFromId { user_id }).await?;
        match self.recv().await? {
            Response::GetUserFromId { name } => Ok(name),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    // -- Messages --

    pub async fn send_message(
        &mut self,
        receiver: UserId,
        content: &str,
    ) -> Result<(), ClientError> {
        self.send(&Request::SendMessage {
            receiver,
            content: content.into(),
        })
        .await?;
        match self.recv().await? {
            Response::SendMessage { error: None } => Ok(()),
            Response::SendMessage { error: Some(e) } => Err(ClientError::Server(e)),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    pub async fn unread_count(&mut self) -> Result<u32, ClientError> {
        self.send(&Request::GetNumberOfUnreadMessages).await?;
        match self.recv().await? {
            Response::GetNumberOfUnreadMessages { count } => Ok(count),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    /// Pop the oldest `num_messages` unread messages into the read archive
    /// and return them; -1 drains the queue.
    pub async fn pop_unread(&mut self, num_messages: i32) -> Result<Vec<Message>, ClientError> {
        self.send(&Request::PopUnreadMessages { num_messages })
            .await?;
        match self.recv().await? {
            Response::PopUnreadMessages { messages } => Ok(messages),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    /// Page the read archive from the newest end; -1 returns everything
    /// older than `offset`.
    pub async fn read_messages(
        &mut self,
        offset: u32,
        num_messages: i32,
    ) -> Result<Vec<Message>, ClientError> {
        self.send(&Request::GetReadMessages {
            offset,
            num_messages,
        })
        .await?;
        match self.recv().await? {
            Response::GetReadMessages { messages } => Ok(messages),
            Response::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::Unexpected(other.kind())),
        }
    }

    /// Fire-and-forget removal from the read archive. Refuses locally while
    /// logged out.
    pub async fn delete_messages(&mut self, message_ids: Vec<MessageId>) -> Result<(), ClientError> {
        self.fire(Request::DeleteMessages { message_ids }).await
    }

    // -- Pushes --

    /// Wait for the next unsolicited message push.
    pub async fn next_push(&mut self) -> Result<Message, ClientError> {
        self.pushes.recv().await.ok_or(ClientError::Closed)
    }

    /// Take a push if one has already arrived.
    pub fn try_push(&mut self) -> Option<Message> {
        self.pushes.try_recv().ok()
    }

    async fn fire(&mut self, request: Request) -> Result<(), ClientError> {
        // The server answers anonymous sessions with an ERROR frame even for
        // requests that otherwise get no reply; with nothing awaiting it,
        // that frame would be consumed as the next request's response.
        if !self.authenticated && !request.expects_response() {
            return Err(ClientError::Server("Authentication required".into()));
        }
        self.send(&request).await
    }

    async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        let frame = self.codec.encode_request(request);
        self.writer.write_all(&frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Response, ClientError> {
        self.responses.recv().await.ok_or(ClientError::Closed)
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    codec: &'static dyn FrameCodec,
    responses: mpsc::UnboundedSender<Response>,
    pushes: mpsc::UnboundedSender<Message>,
) {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        loop {
            match codec.decode_response(&buf) {
                Ok(Some((response, consumed))) => {
                    buf.advance(consumed);
                    let routed = match response {
                        Response::ReceivedMessage { message } => pushes.send(message).is_ok(),
                        other => responses.send(other).is_ok(),
                    };
                    // Both receivers gone means the client was dropped.
                    if !routed {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("protocol error, dropping connection: {}", e);
                    return;
                }
            }
        }
        // Declared lengths are capped by the codec, but a server can still
        // stream an endless frame body. Same limit as the server side.
        if buf.len() > MAX_FRAME_LEN {
            warn!(
                "frame exceeds {} bytes without completing, dropping connection",
                MAX_FRAME_LEN
            );
            return;
        }
    }
}
