use std::collections::BTreeMap;

use courier_proto::{UserId, UserSummary};
use courier_crypto::password;
use regex::Regex;

use crate::StoreError;
use crate::mailbox::Mailbox;

/// One account's stored state.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub name: String,
    pub digest: Vec<u8>,
    pub salt: Vec<u8>,
    pub mailbox: Mailbox,
}

/// The account directory. Ids are handed out once and never reused, so a
/// deleted account's id cannot come back to life under a new owner.
#[derive(Debug, Default)]
pub struct Directory {
    users: BTreeMap<UserId, UserRecord>,
    next_user_id: UserId,
}

impl Directory {
    /// Rebuild from snapshotted parts.
    pub fn from_parts(users: BTreeMap<UserId, UserRecord>, next_user_id: UserId) -> Self {
        Self {
            users,
            next_user_id,
        }
    }

    // -- Accounts --

    /// Register a new account under a fresh id. Does not log the account
    /// in; that is a separate LOGIN round trip.
    pub fn create_account(&mut self, name: &str, password: &str) -> Result<UserId, StoreError> {
        if self.users.values().any(|u| u.name == name) {
            return Err(StoreError::NameTaken(name.to_string()));
        }

        let (digest, salt) =
            password::hash_password(password).map_err(|_| StoreError::HashFailure)?;

        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users.insert(
            id,
            UserRecord {
                name: name.to_string(),
                digest,
                salt,
                mailbox: Mailbox::default(),
            },
        );
        Ok(id)
    }

    /// Check a name/password pair. Returns the account id on success; an
    /// unknown name and a wrong password fail identically.
    pub fn login(&self, name: &str, password: &str) -> Result<UserId, StoreError> {
        let (id, record) = self
            .users
            .iter()
            .find(|(_, u)| u.name == name)
            .ok_or(StoreError::BadCredentials)?;

        if !password::verify_password(password, &record.digest, &record.salt) {
            return Err(StoreError::BadCredentials);
        }
        Ok(*id)
    }

    /// Drop an account and everything in its mailbox. Already-deleted ids
    /// are a no-op.
    pub fn delete_account(&mut self, id: UserId) {
        self.users.remove(&id);
    }

    pub fn get(&self, id: UserId) -> Result<&UserRecord, StoreError> {
        self.users.get(&id).ok_or(StoreError::UnknownUser(id))
    }

    pub fn get_mut(&mut self, id: UserId) -> Result<&mut UserRecord, StoreError> {
        self.users.get_mut(&id).ok_or(StoreError::UnknownUser(id))
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    // -- Listing --

    /// Match account names against a glob where `*` is the only wildcard.
    /// The match anchors at the start of the name, so a bare `te` finds
    /// every name beginning with "te" and an empty pattern finds everyone.
    /// Results come back in ascending id order.
    pub fn list_accounts(&self, pattern: &str) -> Result<Vec<UserSummary>, StoreError> {
        let regex = Regex::new(&format!("^{}", pattern.replace('*', ".*")))
            .map_err(|_| StoreError::BadPattern(pattern.to_string()))?;

        Ok(self
            .users
            .iter()
            .filter(|(_, u)| regex.is_match(&u.name))
            .map(|(id, u)| UserSummary {
                id: *id,
                name: u.name.clone(),
            })
            .collect())
    }

    // -- Snapshot access --

    pub fn users(&self) -> &BTreeMap<UserId, UserRecord> {
        &self.users
    }

    pub fn next_user_id(&self) -> UserId {
        self.next_user_id
    }
}
