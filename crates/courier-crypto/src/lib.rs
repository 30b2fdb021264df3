//! Courier credential hashing.
//!
//! Passwords are never stored or compared in the clear; the account
//! directory keeps only an Argon2id digest plus the random salt it was
//! derived with.

pub mod password;
