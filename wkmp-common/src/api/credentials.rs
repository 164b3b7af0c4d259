//! Credential verification primitives
//!
//! Pure comparison functions used by the Subsonic compatibility layer to check
//! a presented secret against what the credential store holds:
//!
//! - Argon2id password hashes (primary path)
//! - Legacy salted MD5 digests (`t`/`s` query parameters), recomputed from a
//!   stored plaintext password
//! - Opaque API keys
//!
//! # Pure Functions
//!
//! Every function here is total: it answers yes or no (or a decoding error)
//! and never touches the database. Digest and key comparisons run in constant
//! time via `subtle`; the Argon2 comparison does not need to because the hash
//! itself dominates the timing.

use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    rand_core::OsRng,
};
use argon2::Argon2;
use md5::{Digest, Md5};
use rand::RngCore;
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{Error, Result};

/// Marker prefix for hex-encoded passwords (`p=enc:73656372657421`)
pub const ENCODED_PASSWORD_PREFIX: &str = "enc:";

/// Number of random bytes behind a generated API key (rendered as hex)
pub const API_KEY_BYTES: usize = 32;

// ========================================
// Password Hashes
// ========================================

/// Hash a plaintext password with Argon2id and a fresh random salt
///
/// Returns the PHC string (`$argon2id$v=19$...`) suitable for storage.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a presented secret against a stored Argon2 PHC string
///
/// A stored hash that cannot be parsed counts as a mismatch (and is logged),
/// so a corrupt row can never authenticate anyone.
pub fn verify_hash(secret: &[u8], stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is not a valid PHC string: {}", e);
            return false;
        }
    };

    match Argon2::default().verify_password(secret, &parsed) {
        Ok(()) => true,
        Err(PasswordHashError::Password) => false,
        Err(e) => {
            warn!("Password verification error: {}", e);
            false
        }
    }
}

/// Argon2 verification against a hash of a random password nobody holds
///
/// Called when the username is unknown, so that path spends the same hashing
/// time as a wrong password for a real user. Always false.
pub fn verify_dummy_hash(secret: &[u8]) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    let hash = DUMMY_HASH.get_or_init(|| hash_password(&generate_api_key()).ok());
    if let Some(hash) = hash {
        std::hint::black_box(verify_hash(secret, hash));
    }
    false
}

// ========================================
// Legacy Digest Scheme
// ========================================

/// Compute the legacy token: lowercase hex MD5 of `plaintext + salt`
///
/// # Examples
///
/// ```
/// use wkmp_common::api::credentials::legacy_digest;
///
/// assert_eq!(legacy_digest("sesame", "c19b2d"), "26719a1196d2a940705a59634eb18eab");
/// ```
pub fn legacy_digest(plaintext: &str, salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(plaintext.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Recompute the legacy digest and compare it with the presented token
///
/// An empty stored plaintext never verifies, even when the presented token
/// happens to equal `md5("" + salt)`.
pub fn verify_legacy_digest(plaintext: &str, salt: &str, presented_token: &str) -> bool {
    if plaintext.is_empty() {
        return false;
    }

    let expected = legacy_digest(plaintext, salt);
    let presented = presented_token.to_ascii_lowercase();
    constant_time_eq(expected.as_bytes(), presented.as_bytes())
}

// ========================================
// Encoding and Comparison Helpers
// ========================================

/// Decode a hex string into bytes
///
/// Fails with [`Error::InvalidEncoding`] on odd length or non-hex characters.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::InvalidEncoding(e.to_string()))
}

/// Constant-time byte comparison
///
/// Length mismatch returns false after a dummy comparison so that timing does
/// not depend on where the inputs differ.
pub fn constant_time_eq(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Generate a fresh API key: [`API_KEY_BYTES`] random bytes as lowercase hex
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ========================================
// Tests
// ========================================
