//! An unlocked vault and the operations available on it.
//!
//! A [`VaultSession`] owns decrypted state and never holds the master
//! password; the password is needed only at the [`unlock`](VaultSession::unlock)
//! and [`save`](VaultSession::save) boundaries. Saving always re-encrypts
//! under the current scheme, so unlocking a legacy blob and saving it back
//! upgrades it in place.

use thiserror::Error;
use tracing::{debug, info};

use crate::codec::{CodecError, Document};
use crate::crypto::generator::derive_password;
use crate::vault::blob::{self, BlobError};
use crate::vault::state::{CredentialRecord, VaultState, now_millis};

/// Errors from session-level vault operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Document(#[from] CodecError),
}

/// An unlocked vault.
#[derive(Debug, Clone)]
pub struct VaultSession {
    state: VaultState,
}

impl VaultSession {
    /// Create a brand-new empty vault with a fresh entropy seed.
    #[must_use]
    pub fn create() -> Self {
        info!("Creating new vault");
        Self {
            state: VaultState::new(),
        }
    }

    /// Unlock an encrypted blob with the master password.
    pub fn unlock(encrypted: &str, password: &str) -> Result<Self, SessionError> {
        let document_text = blob::decrypt_vault(encrypted, password)?;
        let state = Document::parse(&document_text)?.deserialize()?;
        info!("Vault unlocked");
        Ok(Self { state })
    }

    /// Serialize and encrypt the vault for storage.
    ///
    /// The document version and `lastModified` are bumped on a working copy
    /// and committed only once encryption succeeds, so a failed save leaves
    /// the session exactly as it was.
    pub fn save(&mut self, password: &str) -> Result<String, SessionError> {
        let mut next = self.state.clone();
        next.version += 1;
        next.last_modified = now_millis();

        let document_text = Document::from_serialize(&next)?.to_canonical_string();
        let encrypted = blob::encrypt_vault(&document_text, password)?;

        debug!(version = next.version, "Vault saved");
        self.state = next;
        Ok(encrypted)
    }

    /// Read access to the decrypted state.
    #[must_use]
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// All credential records, in stored order.
    #[must_use]
    pub fn credentials(&self) -> &[CredentialRecord] {
        &self.state.configs
    }

    /// Add a record and return its id.
    pub fn add_credential(&mut self, record: CredentialRecord) -> String {
        let id = record.id.clone();
        debug!(%id, "Credential added");
        self.state.configs.push(record);
        id
    }

    /// Remove a record by id. Returns the removed record, or `None` if no
    /// record has that id.
    pub fn remove_credential(&mut self, id: &str) -> Option<CredentialRecord> {
        let index = self.state.configs.iter().position(|r| r.id == id)?;
        debug!(%id, "Credential removed");
        Some(self.state.configs.remove(index))
    }

    /// Look up a record by id.
    #[must_use]
    pub fn credential(&self, id: &str) -> Option<&CredentialRecord> {
        self.state.configs.iter().find(|r| r.id == id)
    }

    /// Apply a mutation to a record and touch its `updatedAt` timestamp.
    /// Returns false if no record has that id.
    pub fn update_credential<F>(&mut self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut CredentialRecord),
    {
        let Some(record) = self.state.configs.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        mutate(record);
        record.updated_at = Some(Some(now_millis()));
        true
    }

    /// Case-insensitive substring search over record names and usernames.
    #[must_use]
    pub fn find(&self, query: &str) -> Vec<&CredentialRecord> {
        let query = query.to_lowercase();
        self.state
            .configs
            .iter()
            .filter(|r| {
                r.name.to_lowercase().contains(&query)
                    || r.username.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Produce the password for a record: the stored custom password when
    /// one is set, otherwise the deterministic derivation from the vault
    /// seed and the record's generation parameters.
    #[must_use]
    pub fn reveal(&self, record: &CredentialRecord) -> String {
        if let Some(custom) = record.custom_password() {
            return custom.to_string();
        }
        derive_password(
            &self.state.entropy,
            &record.name,
            &record.username,
            record.generation_version(),
            record.password_length(),
            record.symbols_enabled(),
        )
    }

    /// Bump a record's usage counter. Returns false if no record has that
    /// id.
    pub fn record_usage(&mut self, id: &str) -> bool {
        self.update_credential(id, |record| {
            record.usage_count = Some(Some(record.usage_count.flatten().unwrap_or(0) + 1));
        })
    }
}
