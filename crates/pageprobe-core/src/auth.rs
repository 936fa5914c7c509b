//! Pre-shared project credentials.
//!
//! Backends store only the SHA-256 hash of each project key and compare the
//! hash of a presented key against it in constant time.

use crate::error::AuthError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use subtle::ConstantTimeEq;

/// Hex-encoded SHA-256 of a credential.
#[must_use]
pub fn hash_credential(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Project id to stored credential hash.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    hashes: HashMap<String, String>,
}

impl CredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the hash of `key` for `project`, replacing any previous one.
    pub fn insert_key(&mut self, project: impl Into<String>, key: &str) {
        self.hashes.insert(project.into(), hash_credential(key));
    }

    /// Store an already-hashed credential.
    pub fn insert_hash(&mut self, project: impl Into<String>, hash: impl Into<String>) {
        self.hashes.insert(project.into(), hash.into().to_ascii_lowercase());
    }

    /// Check a presented credential against the project's stored hash.
    pub fn verify(&self, project: &str, presented: Option<&str>) -> Result<(), AuthError> {
        let stored = self
            .hashes
            .get(project)
            .ok_or_else(|| AuthError::UnknownProject(project.to_string()))?;
        let presented = presented
            .filter(|key| !key.is_empty())
            .ok_or(AuthError::Unauthorized)?;

        let presented_hash = hash_credential(presented);
        let (a, b) = (presented_hash.as_bytes(), stored.as_bytes());
        // Hash lengths are fixed, so the length check leaks nothing about the key.
        if a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1 {
            Ok(())
        } else {
            tracing::debug!(project, "credential rejected");
            Err(AuthError::Unauthorized)
        }
    }

    /// Number of projects with a stored credential.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Check if no credentials are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
