//! Master-password key derivation for vault encryption.
//!
//! Two schemes live behind one contract. Every new encryption uses Argon2id;
//! the PBKDF2 scheme exists only so blobs written by pre-Argon2 builds keep
//! decrypting. Which scheme runs is decided entirely by the blob header's
//! version byte, never by configuration.

use secrecy::SecretBox;
use zeroize::Zeroizing;

use super::{CryptoError, PBKDF2_ITERATIONS};

/// Derived symmetric key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Domain separation tag prefixed to the stored salt before legacy PBKDF2
/// derivation. Unique to this vault format, so the same password and salt
/// fed to an unrelated PBKDF2 deployment cannot yield the same key.
const LEGACY_SALT_DOMAIN: &[u8] = b"BASTION_VAULT_V1::";

/// Argon2id working memory in KiB (64 MiB).
const ARGON2_MEMORY_KIB: u32 = 65536;
const ARGON2_PASSES: u32 = 3;
const ARGON2_LANES: u32 = 1;

/// A key-derivation strategy, selected by the blob header (see
/// [`crate::vault::blob`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfScheme {
    /// Argon2id, 64 MiB / 3 passes / 1 lane. Mandatory for every new
    /// encryption; intentionally expensive (hundreds of milliseconds).
    Argon2id,
    /// PBKDF2-HMAC-SHA-256, 210 000 iterations over the domain-tagged salt.
    /// Read compatibility only; never used for new encryptions.
    LegacyPbkdf2,
}

impl KdfScheme {
    /// Derive the 256-bit vault key from the master password and the blob's
    /// stored salt.
    pub fn derive_key(
        self,
        password: &str,
        salt: &[u8],
    ) -> Result<SecretBox<[u8; KEY_LEN]>, CryptoError> {
        let start = std::time::Instant::now();
        let key = match self {
            KdfScheme::Argon2id => derive_argon2id(password, salt)?,
            KdfScheme::LegacyPbkdf2 => derive_legacy_pbkdf2(password, salt),
        };
        tracing::debug!(scheme = ?self, elapsed = ?start.elapsed(), "Key derivation complete");
        Ok(key)
    }
}

fn derive_argon2id(
    password: &str,
    salt: &[u8],
) -> Result<SecretBox<[u8; KEY_LEN]>, CryptoError> {
    let params = argon2::Params::new(ARGON2_MEMORY_KIB, ARGON2_PASSES, ARGON2_LANES, Some(KEY_LEN))
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(SecretBox::new(Box::new(*key)))
}

fn derive_legacy_pbkdf2(password: &str, salt: &[u8]) -> SecretBox<[u8; KEY_LEN]> {
    let mut salted = Vec::with_capacity(LEGACY_SALT_DOMAIN.len() + salt.len());
    salted.extend_from_slice(LEGACY_SALT_DOMAIN);
    salted.extend_from_slice(salt);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        &salted,
        password.as_bytes(),
        &mut key[..],
    );

    SecretBox::new(Box::new(*key))
}
