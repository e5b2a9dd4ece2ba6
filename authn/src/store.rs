//! In-memory credential stores for the HTTP adapter.
//!
//! Basic credentials are kept as argon2 PHC strings; Digest credentials as the
//! hex SHA-256 `HA1` digest of `username:realm:password`, so neither store
//! holds a plaintext password.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::debug;

use crate::error::{AuthnError, Result};

/// Resolves Basic credentials.
pub trait BasicResolver: Send + Sync + Debug {
    /// Whether `password` is correct for `username`. Unknown users are `false`.
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Resolves Digest credentials.
pub trait DigestResolver: Send + Sync + Debug {
    /// The hex `HA1` digest for `username` in `realm`, if the user exists.
    fn ha1(&self, username: &str, realm: &str) -> Option<String>;
}

/// Username to argon2 hash map.
#[derive(Debug, Clone, Default)]
pub struct BasicUserStore {
    users: HashMap<String, String>,
}

impl BasicUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user from a PHC-formatted hash, rejecting malformed hashes.
    pub fn insert_hash(&mut self, username: impl Into<String>, phc: impl Into<String>) -> Result<()> {
        let username = username.into();
        let phc = phc.into();
        PasswordHash::new(&phc).map_err(|e| {
            AuthnError::Credentials(format!("invalid password hash for {username}: {e}"))
        })?;
        self.users.insert(username, phc);
        Ok(())
    }

    /// Hashes `password` and adds the user.
    pub fn insert_password(&mut self, username: impl Into<String>, password: &str) -> Result<()> {
        let phc = hash_password(password)?;
        self.users.insert(username.into(), phc);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl BasicResolver for BasicUserStore {
    fn verify(&self, username: &str, password: &str) -> bool {
        let Some(stored) = self.users.get(username) else {
            debug!("Basic credentials for unknown user {}", username);
            return false;
        };
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Username to `HA1` map for a single realm.
#[derive(Debug, Clone, Default)]
pub struct DigestUserStore {
    realm: String,
    users: HashMap<String, String>,
}

impl DigestUserStore {
    pub fn new(realm: impl Into<String>) -> Self {
        Self {
            realm: realm.into(),
            users: HashMap::new(),
        }
    }

    /// Adds a user from a precomputed hex `HA1`.
    pub fn insert_ha1(&mut self, username: impl Into<String>, ha1: impl Into<String>) -> Result<()> {
        let username = username.into();
        let ha1 = ha1.into().to_ascii_lowercase();
        let valid = ha1.len() == 64 && ha1.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(AuthnError::Credentials(format!(
                "digest entry for {username} is not a hex SHA-256 digest"
            )));
        }
        self.users.insert(username, ha1);
        Ok(())
    }

    /// Computes and adds the `HA1` for a plaintext password.
    pub fn insert_password(&mut self, username: impl Into<String>, password: &str) {
        let username = username.into();
        let ha1 = digest_ha1(&username, &self.realm, password);
        self.users.insert(username, ha1);
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl DigestResolver for DigestUserStore {
    fn ha1(&self, username: &str, realm: &str) -> Option<String> {
        if realm != self.realm {
            return None;
        }
        self.users.get(username).cloned()
    }
}

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthnError::Credentials(format!("failed to hash password: {e}")))
}

/// `hex(SHA-256(username:realm:password))`.
pub fn digest_ha1(username: &str, realm: &str, password: &str) -> String {
    hex::encode(Sha256::digest(format!("{username}:{realm}:{password}")))
}
