//! Request dispatch.
//!
//! Every decoded frame lands here while the caller holds the state lock, so
//! handlers run one at a time and mutate the directory directly. Replies and
//! pushes go out through session outboxes; each connection's writer task
//! drains its outbox after the lock is released.
//!
//! CREATE_ACCOUNT and LOGIN are legal on anonymous sessions. Everything else
//! requires a login first and is answered with an ERROR frame otherwise,
//! including the fire-and-forget operations, so a client with a stale session
//! hears about it instead of silently losing writes.

use courier_proto::{Message, Request, Response, UserId, UserSummary};
use courier_store::StoreError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::{ServerState, SessionAuth};

pub fn dispatch(state: &mut ServerState, conn_id: Uuid, request: Request) {
    match request {
        Request::CreateAccount { name, password } => {
            match state.directory.create_account(&name, &password) {
                Ok(id) => {
                    info!("{} ({}) registered", name, id);
                    state.reply(conn_id, Response::CreateAccount { error: None });
                }
                Err(e) => state.reply(
                    conn_id,
                    Response::CreateAccount {
                        error: Some(e.to_string()),
                    },
                ),
            }
        }
        Request::Login { name, password } => match state.directory.login(&name, &password) {
            Ok(id) => {
                state.set_auth(conn_id, SessionAuth::Authenticated(id));
                info!("{} ({}) logged in", name, id);
                state.reply(conn_id, Response::Login { error: None });
            }
            Err(e) => state.reply(
                conn_id,
                Response::Login {
                    error: Some(e.to_string()),
                },
            ),
        },
        other => {
            let user_id = match state.auth(conn_id) {
                SessionAuth::Authenticated(id) => id,
                SessionAuth::Anonymous => {
                    state.reply(
                        conn_id,
                        Response::Error {
                            message: "Authentication required".into(),
                        },
                    );
                    return;
                }
            };
            dispatch_authenticated(state, conn_id, user_id, other);
        }
    }
}

fn dispatch_authenticated(
    state: &mut ServerState,
    conn_id: Uuid,
    user_id: UserId,
    request: Request,
) {
    match request {
        Request::ListUsers {
            pattern,
            offset,
            limit,
        } => {
            let listed = state
                .directory
                .list_accounts(&pattern)
                .and_then(|users| page(users, offset, limit));
            match listed {
                Ok(users) => state.reply(conn_id, Response::ListUsers { users }),
                Err(e) => state.reply(
                    conn_id,
                    Response::Error {
                        message: e.to_string(),
                    },
                ),
            }
        }
        Request::GetUserFromId { user_id: wanted } => match state.directory.get(wanted) {
            Ok(record) => state.reply(
                conn_id,
                Response::GetUserFromId {
                    name: record.name.clone(),
                },
            ),
            Err(e) => state.reply(
                conn_id,
                Response::Error {
                    message: e.to_string(),
                },
            ),
        },
        Request::DeleteAccount => {
            state.directory.delete_account(user_id);
            state.set_auth(conn_id, SessionAuth::Anonymous);
            info!("user {} deleted their account", user_id);
        }
        Request::SendMessage { receiver, content } => {
            if !state.directory.contains(receiver) {
                state.reply(
                    conn_id,
                    Response::SendMessage {
                        error: Some(StoreError::UnknownUser(receiver).to_string()),
                    },
                );
                return;
            }
            let message = Message {
                id: state.alloc_message_id(),
                sender: user_id,
                content,
            };
            // Delivered live if any of the receiver's sessions took the
            // push; those copies go straight to the read archive.
            let delivered = state.push_to_user(
                receiver,
                Response::ReceivedMessage {
                    message: message.clone(),
                },
            );
            debug!(
                "message {} from {} to {} ({})",
                message.id,
                user_id,
                receiver,
                if delivered { "delivered" } else { "queued" }
            );
            if let Ok(record) = state.directory.get_mut(receiver) {
                if delivered {
                    record.mailbox.push_read(message);
                } else {
                    record.mailbox.push_unread(message);
                }
            }
            state.reply(conn_id, Response::SendMessage { error: None });
        }
        Request::GetNumberOfUnreadMessages => match state.directory.get(user_id) {
            Ok(record) => state.reply(
                conn_id,
                Response::GetNumberOfUnreadMessages {
                    count: record.mailbox.unread_count() as u32,
                },
            ),
            Err(e) => state.reply(
                conn_id,
                Response::Error {
                    message: e.to_string(),
                },
            ),
        },
        Request::PopUnreadMessages { num_messages } => {
            let popped = state
                .directory
                .get_mut(user_id)
                .and_then(|record| record.mailbox.pop_unread(num_messages));
            match popped {
                Ok(messages) => state.reply(conn_id, Response::PopUnreadMessages { messages }),
                Err(e) => state.reply(
                    conn_id,
                    Response::Error {
                        message: e.to_string(),
                    },
                ),
            }
        }
        Request::GetReadMessages {
            offset,
            num_messages,
        } => {
            let paged = state
                .directory
                .get(user_id)
                .and_then(|record| record.mailbox.read_page(offset, num_messages));
            match paged {
                Ok(messages) => state.reply(conn_id, Response::GetReadMessages { messages }),
                Err(e) => state.reply(
                    conn_id,
                    Response::Error {
                        message: e.to_string(),
                    },
                ),
            }
        }
        Request::DeleteMessages { message_ids } => {
            // Fire-and-forget; a deleted account just means nothing to do.
            if let Ok(record) = state.directory.get_mut(user_id) {
                record.mailbox.delete_read(&message_ids);
            }
        }
        Request::Logout => {
            state.set_auth(conn_id, SessionAuth::Anonymous);
            info!("user {} logged out", user_id);
        }
        // Routed before the authentication check.
        Request::CreateAccount { .. } | Request::Login { .. } => {}
    }
}

/// LIST_USERS windowing: skip `offset` entries, then take `limit`. A limit of
/// -1 keeps the rest; anything below -1 is rejected.
fn page(users: Vec<UserSummary>, offset: u32, limit: i32) -> Result<Vec<UserSummary>, StoreError> {
    if limit < -1 {
        return Err(StoreError::InvalidCount(limit));
    }
    let rest = users.into_iter().skip(offset as usize);
    Ok(match limit {
        -1 => rest.collect(),
        n => rest.take(n as usize).collect(),
    })
}
