//! Credential store.
//!
//! The store is an external collaborator from the handshake's perspective:
//! given an identifier it returns a public key and a display name, or
//! nothing. The on-disk layout is one directory per identifier holding
//! `<id>.pem` (public key) and `<id>.json` (profile with a `name` field).

use std::path::PathBuf;

use serde::Deserialize;

/// A stored credential: public key plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// PEM-encoded public key as stored.
    pub public_key_pem: String,
    /// Display name from the profile file.
    pub display_name: String,
}

/// Errors from credential store lookups.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem read failed.
    #[error("credential read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file present but not valid JSON.
    #[error("malformed profile: {0}")]
    MalformedProfile(#[from] serde_json::Error),
}

/// Read-only lookup of identifier credentials.
pub trait CredentialStore: Send + Sync {
    /// Look up an identifier.
    ///
    /// Returns `Ok(None)` when the identifier has no stored credential;
    /// `Err` only for store-level faults (I/O, corrupt profile).
    fn lookup(&self, identifier: &str) -> Result<Option<Credential>, StoreError>;
}

/// Profile file shape: at least a display-name field.
#[derive(Debug, Deserialize)]
struct Profile {
    name: String,
}

/// Directory-backed credential store.
///
/// Layout: `<root>/<identifier>/<identifier>.pem` and
/// `<root>/<identifier>/<identifier>.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CredentialStore for DirStore {
    fn lookup(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        // Identifiers are validated upstream, but never let one escape the
        // store root through path separators.
        if identifier.contains(['/', '\\', '.']) {
            return Ok(None);
        }

        let dir = self.root.join(identifier);
        let pem_path = dir.join(format!("{identifier}.pem"));
        let profile_path = dir.join(format!("{identifier}.json"));

        if !pem_path.exists() {
            return Ok(None);
        }

        let public_key_pem = std::fs::read_to_string(&pem_path)?;
        let profile: Profile =
            serde_json::from_str(std::fs::read_to_string(&profile_path)?.trim())?;

        Ok(Some(Credential { public_key_pem, display_name: profile.name }))
    }
}

/// In-memory credential store for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, Credential>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a credential for an identifier.
    pub fn insert(&mut self, identifier: impl Into<String>, credential: Credential) {
        self.entries.insert(identifier.into(), credential);
    }
}

impl CredentialStore for MemoryStore {
    fn lookup(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.entries.get(identifier).cloned())
    }
}
