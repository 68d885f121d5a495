//! Authenticated identity
//!
//! An [`Identity`] is produced once per request by a [`TokenVerifier`] and
//! passed explicitly into the social operations. [`SessionRegistry`] is an
//! in-memory verifier handing out opaque random tokens. Stored passwords go
//! through a [`PasswordScheme`], argon2id by default.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Who a request acts as
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub token_id: Uuid,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    fn new(username: &str, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Identity {
            token_id: Uuid::new_v4(),
            username: username.to_string(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authorization header is not provided")]
    MissingHeader,

    #[error("unsupported authorization type: {0}")]
    UnsupportedScheme(String),

    #[error("token is invalid")]
    Invalid,

    #[error("token is expired")]
    Expired,

    #[error("incorrect username or password")]
    BadCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// One-way password storage
pub trait PasswordScheme: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// False for a mismatch and for a stored hash that does not parse
    fn verify(&self, password: &str, hashed: &str) -> bool;
}

/// argon2id with a random salt per password, stored in PHC string form
#[derive(Debug, Clone, Default)]
pub struct Argon2Passwords {
    params: Params,
}

impl Argon2Passwords {
    pub fn new(params: Params) -> Self {
        Argon2Passwords { params }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            argon2::Version::V0x13,
            self.params.clone(),
        )
    }
}

impl PasswordScheme for Argon2Passwords {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, hashed: &str) -> bool {
        // Cost parameters come from the PHC string, not from `self.params`
        match PasswordHash::new(hashed) {
            Ok(parsed) => self.hasher().verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

/// Turns a bearer token into an identity
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut fields = header.split_whitespace();
    let scheme = fields.next().ok_or(AuthError::MissingHeader)?;
    let token = fields.next().ok_or(AuthError::Invalid)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::UnsupportedScheme(scheme.to_lowercase()));
    }
    Ok(token)
}

/// In-memory sessions keyed by token
pub struct SessionRegistry {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Identity>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        SessionRegistry {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session for `username` and return its token
    pub fn issue(&self, username: &str) -> (String, Identity) {
        let identity = Identity::new(username, self.ttl);
        let token = identity.token_id.simple().to_string();

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(token.clone(), identity.clone());
        debug!("Issued session {} for {}", identity.token_id, username);

        (token, identity)
    }

    /// End a session; false if the token was unknown
    pub fn revoke(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token).is_some()
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, identity| !identity.is_expired_at(now));
        before - sessions.len()
    }
}

impl TokenVerifier for SessionRegistry {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let identity = sessions.get(token).ok_or(AuthError::Invalid)?;

        if identity.is_expired_at(Utc::now()) {
            return Err(AuthError::Expired);
        }
        Ok(identity.clone())
    }
}

/// Minimal argon2 cost so tests stay fast in debug builds
#[cfg(test)]
pub(crate) fn cheap_passwords() -> Argon2Passwords {
    Argon2Passwords::new(Params::new(Params::MIN_M_COST, 1, 1, None).unwrap())
}
