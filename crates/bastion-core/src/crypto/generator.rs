//! Deterministic per-credential password derivation.
//!
//! Service passwords are never stored: they are re-derived on demand from
//! the vault's entropy seed and the record's generation parameters. The
//! derivation is pure and machine-independent - the same inputs must yield
//! the same password forever, so every constant here is part of the wire
//! contract.

use zeroize::Zeroizing;

use super::PBKDF2_ITERATIONS;

/// Domain tag composed into every generator salt. Distinct from the vault
/// key-derivation tag so the two PBKDF2 uses can never collide.
const GENERATOR_SALT_DOMAIN: &str = "BASTION_GENERATOR_V2";

const POOL_ALNUM: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const POOL_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Derive a deterministic password for a service/username pair.
///
/// The salt is `BASTION_GENERATOR_V2::<service>::<username>::v<version>`
/// with service and username lowercased, keyed through PBKDF2-HMAC-SHA-512
/// by the vault's entropy seed. Bumping `version` on a record rotates its
/// password without touching the seed.
///
/// The derived buffer holds `length * 32` bytes and is walked with rejection
/// sampling to eliminate modulo bias: a byte is accepted only below
/// `256 - (256 % pool_len)`. With the smallest pool (62 characters) the
/// acceptance rate is 248/256 per byte, so exhausting the buffer before
/// producing `length` characters has probability below 2^-300 for any
/// length >= 1; it is a documented bound, not an error path.
pub fn derive_password(
    seed: &str,
    service: &str,
    username: &str,
    version: u32,
    length: usize,
    use_symbols: bool,
) -> String {
    if length == 0 {
        return String::new();
    }

    let salt = format!(
        "{GENERATOR_SALT_DOMAIN}::{}::{}::v{version}",
        service.to_lowercase(),
        username.to_lowercase()
    );

    let mut buffer = Zeroizing::new(vec![0u8; length * 32]);
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA512,
        PBKDF2_ITERATIONS,
        salt.as_bytes(),
        seed.as_bytes(),
        &mut buffer,
    );

    let mut pool = POOL_ALNUM.as_bytes().to_vec();
    if use_symbols {
        pool.extend_from_slice(POOL_SYMBOLS.as_bytes());
    }
    let limit = 256 - (256 % pool.len());

    let mut out = String::with_capacity(length);
    for &byte in buffer.iter() {
        if out.len() == length {
            break;
        }
        if (byte as usize) < limit {
            out.push(pool[byte as usize % pool.len()] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn identical_inputs_yield_identical_passwords() {
        let a = derive_password(SEED, "Example", "alice", 1, 16, true);
        let b = derive_password(SEED, "Example", "alice", 1, 16, true);
        assert_eq!(a, b);
        assert_eq!(a.chars().count(), 16);
    }

    #[test]
    fn every_parameter_influences_the_output() {
        let base = derive_password(SEED, "Example", "alice", 1, 16, true);
        assert_ne!(base, derive_password("other-seed", "Example", "alice", 1, 16, true));
        assert_ne!(base, derive_password(SEED, "Example2", "alice", 1, 16, true));
        assert_ne!(base, derive_password(SEED, "Example", "bob", 1, 16, true));
        assert_ne!(base, derive_password(SEED, "Example", "alice", 2, 16, true));
        assert_ne!(base, derive_password(SEED, "Example", "alice", 1, 20, true));
        assert_ne!(base, derive_password(SEED, "Example", "alice", 1, 16, false));
    }

    #[test]
    fn service_and_username_are_case_insensitive() {
        assert_eq!(
            derive_password(SEED, "Example", "Alice", 1, 16, true),
            derive_password(SEED, "example", "alice", 1, 16, true)
        );
    }

    #[test]
    fn alphanumeric_pool_without_symbols() {
        for i in 0..32 {
            let pw = derive_password(SEED, &format!("service-{i}"), "alice", 1, 24, false);
            assert_eq!(pw.len(), 24);
            assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()), "unexpected character in {pw:?}");
        }
    }

    #[test]
    fn symbols_are_reachable_when_enabled() {
        let mut saw_symbol = false;
        for i in 0..64 {
            let pw = derive_password(SEED, &format!("service-{i}"), "alice", 1, 16, true);
            if pw.chars().any(|c| POOL_SYMBOLS.contains(c)) {
                saw_symbol = true;
                break;
            }
        }
        assert!(saw_symbol, "symbol set unreachable across 64 derivations");
    }

    #[test]
    fn zero_length_yields_empty_password() {
        assert_eq!(derive_password(SEED, "Example", "alice", 1, 0, true), "");
    }
}
