//! In-memory account and mailbox state for the courier server, plus the
//! snapshot layer that carries it across restarts.

pub mod directory;
pub mod mailbox;
pub mod snapshot;

pub use directory::{Directory, UserRecord};
pub use mailbox::Mailbox;
pub use snapshot::{JsonFileStore, Snapshot, SnapshotStore};

use courier_proto::UserId;
use thiserror::Error;

/// Domain failures. The dispatcher turns these into in-band error strings
/// or error frames; none of them are fatal to a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Username '{0}' is already taken")]
    NameTaken(String),

    #[error("Invalid username or password")]
    BadCredentials,

    #[error("No user with id {0}")]
    UnknownUser(UserId),

    #[error("Invalid listing pattern '{0}'")]
    BadPattern(String),

    #[error("Invalid message count {0}")]
    InvalidCount(i32),

    #[error("Password hashing failed")]
    HashFailure,
}
