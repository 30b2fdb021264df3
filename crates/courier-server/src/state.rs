use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use courier_proto::{MessageId, Response, UserId};
use courier_store::{Directory, Snapshot};
use tokio::sync::mpsc;
use uuid::Uuid;

/// What a connection has proven about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAuth {
    Anonymous,
    Authenticated(UserId),
}

/// Server-side handle for one live connection.
pub struct Session {
    pub auth: SessionAuth,
    pub outbox: mpsc::UnboundedSender<Response>,
}

/// Everything dispatch touches, under one lock: the account directory, the
/// live session table, and the message id counter.
pub struct ServerState {
    pub directory: Directory,
    sessions: HashMap<Uuid, Session>,
    next_message_id: MessageId,
}

/// Shared across connection tasks. Held only for the synchronous span of a
/// single dispatch, never across an await.
pub type SharedState = Arc<Mutex<ServerState>>;

impl ServerState {
    pub fn new() -> Self {
        Self {
            directory: Directory::default(),
            sessions: HashMap::new(),
            next_message_id: 0,
        }
    }

    /// Restore accounts, mailboxes and counters. Sessions always start
    /// empty; connections do not survive a restart.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let (directory, next_message_id) = snapshot.restore()?;
        Ok(Self {
            directory,
            sessions: HashMap::new(),
            next_message_id,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.directory, self.next_message_id)
    }

    // -- Sessions --

    /// New connections start Anonymous.
    pub fn register_session(&mut self, conn_id: Uuid, outbox: mpsc::UnboundedSender<Response>) {
        self.sessions.insert(
            conn_id,
            Session {
                auth: SessionAuth::Anonymous,
                outbox,
            },
        );
    }

    pub fn drop_session(&mut self, conn_id: Uuid) {
        self.sessions.remove(&conn_id);
    }

    pub fn auth(&self, conn_id: Uuid) -> SessionAuth {
        self.sessions
            .get(&conn_id)
            .map_or(SessionAuth::Anonymous, |s| s.auth)
    }

    pub fn set_auth(&mut self, conn_id: Uuid, auth: SessionAuth) {
        if let Some(session) = self.sessions.get_mut(&conn_id) {
            session.auth = auth;
        }
    }

    /// Queue a response on one connection's outbox. A gone connection is
    /// ignored; its task cleans the session up on exit.
    pub fn reply(&self, conn_id: Uuid, response: Response) {
        if let Some(session) = self.sessions.get(&conn_id) {
            let _ = session.outbox.send(response);
        }
    }

    /// Push a frame to every session logged in as `user_id`. Returns true
    /// if at least one live session accepted it.
    pub fn push_to_user(&self, user_id: UserId, response: Response) -> bool {
        let mut delivered = false;
        for session in self.sessions.values() {
            if session.auth == SessionAuth::Authenticated(user_id)
                && session.outbox.send(response.clone()).is_ok()
            {
                delivered = true;
            }
        }
        delivered
    }

    // -- Messages --

    /// Hand out the next message id. Global, monotonic, never reused.
    pub fn alloc_message_id(&mut self) -> MessageId {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_connections_read_as_anonymous() {
        let state = ServerState::new();
        assert_eq!(state.auth(Uuid::new_v4()), SessionAuth::Anonymous);
    }

    #[test]
    fn push_reaches_every_session_of_a_user() {
        let mut state = ServerState::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (conn_a, conn_b) = (Uuid::new_v4(), Uuid::new_v4());
        state.register_session(conn_a, tx_a);
        state.register_session(conn_b, tx_b);
        state.set_auth(conn_a, SessionAuth::Authenticated(3));
        state.set_auth(conn_b, SessionAuth::Authenticated(3));

        let pushed = state.push_to_user(
            3,
            Response::GetNumberOfUnreadMessages { count: 1 },
        );
        assert!(pushed);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn push_to_absent_user_reports_nothing_delivered() {
        let mut state = ServerState::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        state.register_session(conn, tx);

        assert!(!state.push_to_user(9, Response::GetNumberOfUnreadMessages { count: 0 }));
    }

    #[test]
    fn message_ids_survive_a_snapshot() {
        let mut state = ServerState::new();
        state.alloc_message_id();
        state.alloc_message_id();

        let mut restored = ServerState::from_snapshot(state.snapshot()).unwrap();
        assert_eq!(restored.alloc_message_id(), 2);
    }
}
