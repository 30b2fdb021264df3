use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use courier_proto::{MessageId, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::directory::{Directory, UserRecord};
use crate::mailbox::Mailbox;

/// A full dump of server state at one instant: every account, every
/// mailbox, and the id counters that must survive a restart.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub next_user_id: UserId,
    pub next_message_id: MessageId,
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: UserId,
    pub name: String,
    /// Credential digest and salt, base64 so the snapshot stays one
    /// readable JSON document.
    pub digest: String,
    pub salt: String,
    pub mailbox: Mailbox,
}

impl Snapshot {
    /// Capture the directory and the message id counter.
    pub fn capture(directory: &Directory, next_message_id: MessageId) -> Self {
        Self {
            saved_at: Utc::now(),
            next_user_id: directory.next_user_id(),
            next_message_id,
            users: directory
                .users()
                .iter()
                .map(|(id, u)| UserEntry {
                    id: *id,
                    name: u.name.clone(),
                    digest: BASE64.encode(&u.digest),
                    salt: BASE64.encode(&u.salt),
                    mailbox: u.mailbox.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild the directory and message id counter.
    pub fn restore(self) -> Result<(Directory, MessageId)> {
        let mut users = BTreeMap::new();
        for entry in self.users {
            users.insert(
                entry.id,
                UserRecord {
                    name: entry.name,
                    digest: BASE64.decode(&entry.digest)?,
                    salt: BASE64.decode(&entry.salt)?,
                    mailbox: entry.mailbox,
                },
            );
        }
        Ok((
            Directory::from_parts(users, self.next_user_id),
            self.next_message_id,
        ))
    }
}

/// Where snapshots live. The server loads one on startup when present and
/// writes one on shutdown; implementations can target a file, a test
/// buffer, or discard them.
pub trait SnapshotStore: Send {
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
    fn load(&self) -> Result<Option<Snapshot>>;
}

/// One pretty-printed JSON document per file, rewritten whole on each save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing snapshot to {}", self.path.display()))?;
        info!(
            "Snapshot saved to {} ({} users)",
            self.path.display(),
            snapshot.users.len()
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("reading snapshot from {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing snapshot at {}", self.path.display()))?;
        info!(
            "Snapshot loaded from {} ({} users)",
            self.path.display(),
            snapshot.users.len()
        );
        Ok(Some(snapshot))
    }
}
