//! The courier chat server.
//!
//! One listener, one shared state value, one wire format. Each accepted
//! connection gets a reader task that decodes and dispatches frames and a
//! writer task that drains the session's outbox; all state mutation runs
//! through [`dispatch::dispatch`] under a single lock.

pub mod connection;
pub mod dispatch;
pub mod server;
pub mod state;

pub use server::ChatServer;
pub use state::{ServerState, SessionAuth, SharedState};
