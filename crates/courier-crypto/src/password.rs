use anyhow::{Result, anyhow};
use argon2::Argon2;
use rand_core::{OsRng, RngCore};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Hash a new password with a fresh random salt.
/// Returns (digest, salt); the directory stores both.
pub fn hash_password(password: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut digest = [0u8; HASH_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut digest)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;

    Ok((digest.to_vec(), salt.to_vec()))
}

/// Re-derive a candidate digest with the stored salt and compare.
pub fn verify_password(password: &str, digest: &[u8], salt: &[u8]) -> bool {
    let mut candidate = [0u8; HASH_LEN];
    if Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut candidate)
        .is_err()
    {
        return false;
    }
    candidate.as_slice() == digest
}
