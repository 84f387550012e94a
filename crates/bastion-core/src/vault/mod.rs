//! Vault blob format, document model, and session operations.

pub mod blob;
pub mod session;
pub mod state;

pub use blob::{BlobError, decrypt_vault, encrypt_vault};
pub use session::{SessionError, VaultSession};
pub use state::{CredentialRecord, VaultState};
