use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::{
    models::{NewUser, User},
    repository::{RepoError, Repository},
};

/// CredentialError
///
/// Registration and hashing failures. The `Missing*` variants and a repository
/// `Conflict` are user mistakes and are flashed back to the form; the rest are
/// infrastructure failures.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No username was given")]
    MissingUsername,

    #[error("No email was given")]
    MissingEmail,

    #[error("No password was given")]
    MissingPassword,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl CredentialError {
    /// Whether the failure is the user's to fix (and safe to show them).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            CredentialError::MissingUsername
                | CredentialError::MissingEmail
                | CredentialError::MissingPassword
                | CredentialError::Repository(RepoError::Conflict(_))
        )
    }
}

/// hash_password
///
/// Produces an Argon2id PHC string with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// verify_password
///
/// Checks a plaintext against a stored PHC string. A malformed stored hash is
/// a mismatch, never a match.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// register
///
/// Creates a user whose password is stored only as a salted hash. Hashing is
/// CPU-bound and runs on the blocking pool.
pub async fn register(
    repo: &dyn Repository,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, CredentialError> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() {
        return Err(CredentialError::MissingUsername);
    }
    if email.is_empty() {
        return Err(CredentialError::MissingEmail);
    }
    if password.is_empty() {
        return Err(CredentialError::MissingPassword);
    }

    let plaintext = password.to_string();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&plaintext)).await??;

    let user = repo
        .create_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await?;

    tracing::info!(user = %user.id, username = %user.username, "registered new user");
    Ok(user)
}

/// authenticate
///
/// Resolves a username/password pair to a user. `Ok(None)` covers both an
/// unknown username and a wrong password.
pub async fn authenticate(
    repo: &dyn Repository,
    username: &str,
    password: &str,
) -> Result<Option<User>, CredentialError> {
    let Some(user) = repo.find_user_by_username(username.trim()).await? else {
        return Ok(None);
    };

    let plaintext = password.to_string();
    let stored_hash = user.password_hash.clone();
    let matches =
        tokio::task::spawn_blocking(move || verify_password(&plaintext, &stored_hash)).await?;

    Ok(matches.then_some(user))
}
