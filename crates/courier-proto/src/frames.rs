use serde::{Deserialize, Serialize};

pub type UserId = u32;
pub type MessageId = u32;

/// A delivered chat message. Immutable once constructed; `sender` is a user
/// id (clients resolve it to a name with GET_USER_FROM_ID).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: UserId,
    pub content: String,
}

/// One LIST_USERS result entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
}

/// Wire type codes. 1-11 match the original protocol revision; 12-13 cover
/// LOGOUT and the typed error frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    CreateAccount = 1,
    Login = 2,
    ListUsers = 3,
    GetUserFromId = 4,
    DeleteAccount = 5,
    SendMessage = 6,
    ReceivedMessage = 7,
    GetNumberOfUnreadMessages = 8,
    PopUnreadMessages = 9,
    GetReadMessages = 10,
    DeleteMessages = 11,
    Logout = 12,
    Error = 13,
}

impl MessageKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::CreateAccount),
            2 => Some(Self::Login),
            3 => Some(Self::ListUsers),
            4 => Some(Self::GetUserFromId),
            5 => Some(Self::DeleteAccount),
            6 => Some(Self::SendMessage),
            7 => Some(Self::ReceivedMessage),
            8 => Some(Self::GetNumberOfUnreadMessages),
            9 => Some(Self::PopUnreadMessages),
            10 => Some(Self::GetReadMessages),
            11 => Some(Self::DeleteMessages),
            12 => Some(Self::Logout),
            13 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Server-bound payloads. `limit` and `num_messages` are signed because -1
/// means "everything"; offsets ride as unsigned so negative windows are
/// unrepresentable on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Request {
    CreateAccount {
        name: String,
        password: String,
    },
    Login {
        name: String,
        password: String,
    },
    ListUsers {
        pattern: String,
        offset: u32,
        limit: i32,
    },
    GetUserFromId {
        user_id: UserId,
    },
    DeleteAccount,
    SendMessage {
        receiver: UserId,
        content: String,
    },
    GetNumberOfUnreadMessages,
    PopUnreadMessages {
        num_messages: i32,
    },
    GetReadMessages {
        offset: u32,
        num_messages: i32,
    },
    DeleteMessages {
        message_ids: Vec<MessageId>,
    },
    Logout,
}

impl Request {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::CreateAccount { .. } => MessageKind::CreateAccount,
            Self::Login { .. } => MessageKind::Login,
            Self::ListUsers { .. } => MessageKind::ListUsers,
            Self::GetUserFromId { .. } => MessageKind::GetUserFromId,
            Self::DeleteAccount => MessageKind::DeleteAccount,
            Self::SendMessage { .. } => MessageKind::SendMessage,
            Self::GetNumberOfUnreadMessages => MessageKind::GetNumberOfUnreadMessages,
            Self::PopUnreadMessages { .. } => MessageKind::PopUnreadMessages,
            Self::GetReadMessages { .. } => MessageKind::GetReadMessages,
            Self::DeleteMessages { .. } => MessageKind::DeleteMessages,
            Self::Logout => MessageKind::Logout,
        }
    }

    /// DELETE_ACCOUNT, DELETE_MESSAGES and LOGOUT are fire-and-forget: the
    /// server sends no reply on success (but still replies with an ERROR
    /// frame when the session is not authenticated).
    pub fn expects_response(&self) -> bool {
        !matches!(
            self,
            Self::DeleteAccount | Self::DeleteMessages { .. } | Self::Logout
        )
    }
}

/// Client-bound payloads. Tagged with the same type code as the request they
/// answer; RECEIVED_MESSAGE is the unsolicited push and ERROR the typed
/// failure reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    CreateAccount {
        error: Option<String>,
    },
    Login {
        error: Option<String>,
    },
    ListUsers {
        users: Vec<UserSummary>,
    },
    GetUserFromId {
        name: String,
    },
    SendMessage {
        error: Option<String>,
    },
    ReceivedMessage {
        message: Message,
    },
    GetNumberOfUnreadMessages {
        count: u32,
    },
    PopUnreadMessages {
        messages: Vec<Message>,
    },
    GetReadMessages {
        messages: Vec<Message>,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::CreateAccount { .. } => MessageKind::CreateAccount,
            Self::Login { .. } => MessageKind::Login,
            Self::ListUsers { .. } => MessageKind::ListUsers,
            Self::GetUserFromId { .. } => MessageKind::GetUserFromId,
            Self::SendMessage { .. } => MessageKind::SendMessage,
            Self::ReceivedMessage { .. } => MessageKind::ReceivedMessage,
            Self::GetNumberOfUnreadMessages { .. } => MessageKind::GetNumberOfUnreadMessages,
            Self::PopUnreadMessages { .. } => MessageKind::PopUnreadMessages,
            Self::GetReadMessages { .. } => MessageKind::GetReadMessages,
            Self::Error { .. } => MessageKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for code in 1..=13u8 {
            let kind = MessageKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(MessageKind::from_code(0), None);
        assert_eq!(MessageKind::from_code(14), None);
        assert_eq!(MessageKind::from_code(255), None);
    }

    #[test]
    fn only_the_fire_and_forget_trio_skips_the_reply() {
        assert!(!Request::DeleteAccount.expects_response());
        assert!(!Request::DeleteMessages { message_ids: vec![] }.expects_response());
        assert!(!Request::Logout.expects_response());
        assert!(Request::GetNumberOfUnreadMessages.expects_response());
        assert!(
            Request::Login {
                name: "a".into(),
                password: "b".into()
            }
            .expects_response()
        );
    }

    #[test]
    fn request_kinds_match_catalogue() {
        assert_eq!(
            Request::CreateAccount {
                name: "a".into(),
                password: "b".into()
            }
            .kind()
            .code(),
            1
        );
        assert_eq!(Request::Logout.kind().code(), 12);
        assert_eq!(
            Response::Error {
                message: "nope".into()
            }
            .kind()
            .code(),
            13
        );
    }
}
