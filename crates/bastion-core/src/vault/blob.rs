//! The Bastion blob wire format.
//!
//! A blob is the fully encrypted, text-encoded form of a vault:
//!
//! ```text
//! MAGIC(4) = "BSTN" | SCHEME_VERSION(1) | SALT(16) | NONCE(12) | CIPHERTEXT+TAG(16)
//! ```
//!
//! the whole sequence carried as standard base64. Blobs written before the
//! header was introduced start directly at the salt and always use the
//! legacy PBKDF2 derivation.
//!
//! The plaintext inside the ciphertext is framed: a 4-byte little-endian
//! length, the UTF-8 document, then zero padding up to a 64-byte multiple so
//! small edits do not show up as ciphertext-length changes. Pre-framing
//! blobs carry the document verbatim; de-framing falls back to the whole
//! buffer when the length prefix does not fit.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{CryptoError, KdfScheme};

/// Fixed magic constant opening every headered blob ("BSTN").
pub const MAGIC: [u8; 4] = [0x42, 0x53, 0x54, 0x4E];

/// Scheme version byte written on every new encryption.
pub const SCHEME_CURRENT: u8 = 0x04;

/// Lowest header byte that selects Argon2id derivation.
const SCHEME_ARGON2_MIN: u8 = 0x03;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Framed plaintext is padded to a multiple of this block size.
const FRAME_BLOCK: usize = 64;

/// Errors that can occur while encoding or decoding a vault blob.
#[derive(Error, Debug)]
pub enum BlobError {
    /// The blob is too short or not structurally a Bastion blob.
    ///
    /// The message deliberately matches [`BlobError::AuthenticationFailed`]:
    /// surfacing either variant verbatim reveals nothing that separates
    /// malformed input from a wrong password.
    #[error("Vault blob could not be decrypted - invalid data or wrong password")]
    InvalidFormat,

    /// Authentication tag verification failed.
    ///
    /// This means a wrong password or a corrupted/tampered blob; the two
    /// causes are cryptographically indistinguishable and are reported
    /// identically on purpose.
    #[error("Vault blob could not be decrypted - invalid data or wrong password")]
    AuthenticationFailed,

    /// The header names a scheme version this build does not recognize.
    #[error("Unsupported vault scheme version: 0x{0:02x}")]
    UnsupportedScheme(u8),

    /// Authenticated decryption succeeded but the payload is not UTF-8 text.
    /// Only reachable after the tag check, so it leaks nothing about the
    /// password.
    #[error("Decrypted payload is not valid vault document text")]
    MalformedPayload,

    /// AEAD encryption failed (plaintext exceeds a single GCM message).
    #[error("Vault encryption failed")]
    Encryption,

    /// Key derivation failure from the underlying KDF.
    #[error(transparent)]
    Kdf(#[from] CryptoError),
}

/// Encrypt document text into a transportable blob.
///
/// Always uses the current scheme (Argon2id, header version
/// [`SCHEME_CURRENT`]) with a fresh random salt and nonce, whatever scheme
/// the document was previously decrypted with. Either returns a complete,
/// fully authenticated blob or fails before producing any bytes.
pub fn encrypt_vault(document: &str, password: &str) -> Result<String, BlobError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = KdfScheme::Argon2id.derive_key(password, &salt)?;
    let framed = frame(document.as_bytes())?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_secret()));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), framed.as_slice())
        .map_err(|_| BlobError::Encryption)?;

    let mut blob = Vec::with_capacity(MAGIC.len() + 1 + SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&MAGIC);
    blob.push(SCHEME_CURRENT);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    debug!(blob_len = blob.len(), "Vault encrypted");
    Ok(BASE64.encode(blob))
}

/// Decrypt a blob back into document text.
///
/// The header's version byte alone selects the key-derivation scheme; a
/// missing magic constant means a header-less legacy blob. Either returns
/// the complete document or fails without exposing partial plaintext.
pub fn decrypt_vault(blob: &str, password: &str) -> Result<String, BlobError> {
    let data = BASE64
        .decode(blob.trim())
        .map_err(|_| BlobError::InvalidFormat)?;

    let (scheme, offset) = if data.len() > MAGIC.len() + 1 && data[..MAGIC.len()] == MAGIC {
        (scheme_for_version(data[MAGIC.len()])?, MAGIC.len() + 1)
    } else {
        (KdfScheme::LegacyPbkdf2, 0)
    };

    if data.len() < offset + SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(BlobError::InvalidFormat);
    }

    let salt = &data[offset..offset + SALT_LEN];
    let nonce = &data[offset + SALT_LEN..offset + SALT_LEN + NONCE_LEN];
    let ciphertext = &data[offset + SALT_LEN + NONCE_LEN..];

    debug!(?scheme, "Unlocking vault blob");
    let key = scheme.derive_key(password, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_secret()));
    let plaintext = Zeroizing::new(cipher.decrypt(Nonce::from_slice(nonce), ciphertext).map_err(
        |_| {
            warn!("Vault decryption failed - authentication tag mismatch");
            BlobError::AuthenticationFailed
        },
    )?);

    let payload = deframe(&plaintext);
    String::from_utf8(payload.to_vec()).map_err(|_| BlobError::MalformedPayload)
}

fn scheme_for_version(version: u8) -> Result<KdfScheme, BlobError> {
    match version {
        v if v > SCHEME_CURRENT => Err(BlobError::UnsupportedScheme(v)),
        v if v >= SCHEME_ARGON2_MIN => Ok(KdfScheme::Argon2id),
        _ => Ok(KdfScheme::LegacyPbkdf2),
    }
}

/// Length-prefix and zero-pad the payload to a [`FRAME_BLOCK`] multiple.
fn frame(payload: &[u8]) -> Result<Zeroizing<Vec<u8>>, BlobError> {
    let declared = u32::try_from(payload.len()).map_err(|_| BlobError::Encryption)?;
    let padded = (4 + payload.len()).next_multiple_of(FRAME_BLOCK);

    let mut framed = Zeroizing::new(vec![0u8; padded]);
    framed[..4].copy_from_slice(&declared.to_le_bytes());
    framed[4..4 + payload.len()].copy_from_slice(payload);
    Ok(framed)
}

/// Recover the payload from decrypted plaintext.
///
/// If the 4-byte little-endian length fits within the remaining buffer, that
/// many bytes are the payload and the rest is discarded padding. Otherwise
/// the plaintext predates framing and is the payload verbatim.
fn deframe(plaintext: &[u8]) -> &[u8] {
    if plaintext.len() > 4 {
        let declared =
            u32::from_le_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]) as usize;
        if declared <= plaintext.len() - 4 {
            return &plaintext[4..4 + declared];
        }
    }
    plaintext
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn frame_pads_to_block_multiple() {
        for d in [0usize, 1, 59, 60, 61, 64, 100, 4096] {
            let payload = vec![0xAB; d];
            let framed = frame(&payload).unwrap();
            assert_eq!(framed.len(), (4 + d).next_multiple_of(64), "payload len {d}");
            assert_eq!(deframe(&framed), payload.as_slice());
        }
    }

    #[test]
    fn deframe_falls_back_to_verbatim_plaintext() {
        // No room for a length prefix.
        assert_eq!(deframe(b"abc"), b"abc");
        // Length prefix exceeding the buffer: legacy unframed plaintext that
        // happens to start with large bytes.
        let unframed = [0xFF, 0xFF, 0xFF, 0xFF, b'h', b'i'];
        assert_eq!(deframe(&unframed), unframed.as_slice());
    }

    #[test]
    fn scheme_selection_by_header_byte() {
        assert_eq!(scheme_for_version(0x00).unwrap(), KdfScheme::LegacyPbkdf2);
        assert_eq!(scheme_for_version(0x01).unwrap(), KdfScheme::LegacyPbkdf2);
        assert_eq!(scheme_for_version(0x02).unwrap(), KdfScheme::LegacyPbkdf2);
        assert_eq!(scheme_for_version(0x03).unwrap(), KdfScheme::Argon2id);
        assert_eq!(scheme_for_version(0x04).unwrap(), KdfScheme::Argon2id);
        assert!(matches!(
            scheme_for_version(0x05),
            Err(BlobError::UnsupportedScheme(0x05))
        ));
    }

    #[test]
    fn unsupported_scheme_is_rejected_before_key_derivation() {
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);
        data.push(0x7F);
        data.extend_from_slice(&[0u8; SALT_LEN + NONCE_LEN + TAG_LEN]);
        let blob = BASE64.encode(data);
        assert!(matches!(
            decrypt_vault(&blob, "pw"),
            Err(BlobError::UnsupportedScheme(0x7F))
        ));
    }

    #[test]
    fn short_and_invalid_blobs_are_invalid_format() {
        assert!(matches!(
            decrypt_vault("not base64 !!!", "pw"),
            Err(BlobError::InvalidFormat)
        ));
        let short = BASE64.encode([0u8; 20]);
        assert!(matches!(
            decrypt_vault(&short, "pw"),
            Err(BlobError::InvalidFormat)
        ));
        let mut headered = Vec::new();
        headered.extend_from_slice(&MAGIC);
        headered.push(SCHEME_CURRENT);
        headered.extend_from_slice(&[0u8; 10]);
        assert!(matches!(
            decrypt_vault(&BASE64.encode(headered), "pw"),
            Err(BlobError::InvalidFormat)
        ));
    }

    #[test]
    fn indistinguishable_failure_messages() {
        assert_eq!(
            BlobError::InvalidFormat.to_string(),
            BlobError::AuthenticationFailed.to_string()
        );
    }

    #[test]
    fn roundtrip_under_current_scheme() {
        let doc = r#"{"version":1,"entropy":"ab","configs":[]}"#;
        let blob = encrypt_vault(doc, "master password").unwrap();

        let data = BASE64.decode(&blob).unwrap();
        assert_eq!(&data[..4], &MAGIC);
        assert_eq!(data[4], SCHEME_CURRENT);

        assert_eq!(decrypt_vault(&blob, "master password").unwrap(), doc);
    }

    #[test]
    fn wrong_password_is_authentication_failure() {
        let blob = encrypt_vault("{}", "right").unwrap();
        assert!(matches!(
            decrypt_vault(&blob, "wrong"),
            Err(BlobError::AuthenticationFailed)
        ));
    }

    #[test]
    fn bit_flips_are_authentication_failures() {
        let blob = encrypt_vault(r#"{"a":1}"#, "pw").unwrap();
        let data = BASE64.decode(&blob).unwrap();

        // Flip one bit in the salt, the nonce, the ciphertext body, and the tag.
        for index in [6, 5 + SALT_LEN + 3, 5 + SALT_LEN + NONCE_LEN + 2, data.len() - 1] {
            let mut tampered = data.clone();
            tampered[index] ^= 0x01;
            let result = decrypt_vault(&BASE64.encode(&tampered), "pw");
            assert!(
                matches!(result, Err(BlobError::AuthenticationFailed)),
                "byte {index} flip not caught"
            );
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn frame_deframe_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..4096)) {
            let framed = frame(&payload).unwrap();
            prop_assert_eq!(framed.len() % FRAME_BLOCK, 0);
            prop_assert_eq!(deframe(&framed), payload.as_slice());
        }
    }
}
