//! Cryptographic primitives for Bastion vault operations.

pub mod generator;
pub mod kdf;

use std::num::NonZeroU32;

use thiserror::Error;

/// Iteration count shared by every PBKDF2 derivation in the format (legacy
/// vault keys and the credential generator). Fixed by the wire contract.
pub(crate) const PBKDF2_ITERATIONS: NonZeroU32 = NonZeroU32::new(210_000).unwrap();

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key derivation failed, typically because the memory-hard hash
    /// rejected its parameters or could not allocate its working memory.
    ///
    /// **[SYSTEM ERROR]** This does not indicate a wrong password; password
    /// mismatches surface later as an authentication failure.
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

// Re-export commonly used types
pub use kdf::KdfScheme;
