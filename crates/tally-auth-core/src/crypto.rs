//! Invitation secrets and password hashing
//!
//! Invitation tokens are only ever stored as SHA-256 hashes; the raw value
//! exists in memory long enough to be handed to the invitee.

use std::sync::OnceLock;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::AuthError;

/// Bytes of entropy in an invitation token
pub const INVITATION_TOKEN_BYTES: usize = 32;

/// Generate a new invitation token as lowercase hex (64 characters)
pub fn generate_invitation_token() -> String {
    let mut bytes = [0u8; INVITATION_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Securely hash a token for storage.
///
/// Uses SHA-256 to create a one-way hash of the token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password with bcrypt off the async runtime
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// Verify a password against a bcrypt hash off the async runtime.
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?;

    match verified {
        Ok(ok) => Ok(ok),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be verified");
            Ok(false)
        }
    }
}

static DECOY_HASH: OnceLock<Option<String>> = OnceLock::new();

fn decoy_hash() -> Option<&'static str> {
    DECOY_HASH
        .get_or_init(|| {
            let mut secret = [0u8; INVITATION_TOKEN_BYTES];
            rand::rng().fill_bytes(&mut secret);
            bcrypt::hash(hex::encode(secret), bcrypt::DEFAULT_COST).ok()
        })
        .as_deref()
}

/// Run a full bcrypt verification against a random hash of production cost.
/// Always reports a mismatch.
pub async fn verify_against_decoy(password: &str) -> Result<bool, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        if let Some(hash) = decoy_hash() {
            let _ = bcrypt::verify(password, hash);
        }
    })
    .await
    .map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(false)
}
