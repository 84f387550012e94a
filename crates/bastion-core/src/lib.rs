//! Core cryptography and document handling for Bastion vaults.
//!
//! A vault is a single encrypted blob: base64 text wrapping a versioned
//! header, salt, nonce, and an AES-256-GCM ciphertext of the canonical
//! document. This crate implements the full lifecycle - create, unlock,
//! mutate, save - plus the deterministic credential generator that makes
//! stored per-service passwords unnecessary.
//!
//! ```no_run
//! use bastion_core::{CredentialRecord, VaultSession};
//!
//! let mut session = VaultSession::create();
//! let id = session.add_credential(CredentialRecord::new("Example", "alice"));
//! let password = session.reveal(session.credential(&id).unwrap());
//! let blob = session.save("master password").unwrap();
//!
//! let reopened = VaultSession::unlock(&blob, "master password").unwrap();
//! assert_eq!(reopened.credentials().len(), 1);
//! ```

pub mod codec;
pub mod crypto;
pub mod error;
pub mod vault;

pub use codec::Document;
pub use crypto::generator::derive_password;
pub use vault::{
    CredentialRecord, VaultSession, VaultState, decrypt_vault, encrypt_vault,
};
