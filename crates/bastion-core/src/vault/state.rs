//! Typed vault document model.
//!
//! These structs mirror the plaintext document schema. Every struct carries
//! a flattened map of unknown fields so documents written by newer builds
//! survive a load/save cycle here without losing data. Nullable known
//! fields use the double-`Option` pattern for the same reason: an explicit
//! `null` on the wire must re-serialize as `null`, not vanish.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::rust::double_option;
use tracing::debug;

/// Default generated-password length when a record omits `length`.
const DEFAULT_LENGTH: u64 = 16;

/// Upper bound on the generated-password length. Stored lengths beyond this
/// are clamped so a corrupt value cannot drive the generator into an
/// oversized derivation.
const MAX_LENGTH: u64 = 1024;

/// One credential entry.
///
/// The password itself is never stored; it is re-derived from the vault
/// entropy and this record's generation parameters, unless
/// `custom_password` overrides generation entirely.
///
/// Optional fields are `Option<Option<T>>`: the outer layer is key
/// presence, the inner layer is `null`. Prefer the accessor methods, which
/// collapse both layers into the documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub category: Option<Option<String>>,
    /// Generation version; bumping it rotates the derived password.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub version: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub length: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub use_symbols: Option<Option<bool>>,
    /// A user-supplied literal password. When non-empty it wins over
    /// derivation.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub custom_password: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub breach_stats: Option<Option<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub compromised: Option<Option<bool>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ts::opt_millis"
    )]
    pub created_at: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ts::opt_millis"
    )]
    pub updated_at: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub usage_count: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub sort_order: Option<Option<i64>>,
    /// Fields this build does not know about, carried through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// Create a fresh record with generation defaults and current
    /// timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>, username: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            username: username.into(),
            category: Some(Some("login".to_string())),
            version: Some(Some(1)),
            length: Some(Some(DEFAULT_LENGTH)),
            use_symbols: Some(Some(true)),
            custom_password: None,
            breach_stats: None,
            compromised: None,
            created_at: Some(Some(now)),
            updated_at: Some(Some(now)),
            usage_count: Some(Some(0)),
            sort_order: None,
            extra: Map::new(),
        }
    }

    /// Generation version, defaulting to 1 for records that omit it.
    #[must_use]
    pub fn generation_version(&self) -> u32 {
        u32::try_from(self.version.flatten().unwrap_or(1)).unwrap_or(u32::MAX)
    }

    /// Derived-password length, defaulting to 16 and clamped to
    /// [`MAX_LENGTH`].
    #[must_use]
    pub fn password_length(&self) -> usize {
        let length = self.length.flatten().unwrap_or(DEFAULT_LENGTH).min(MAX_LENGTH);
        usize::try_from(length).unwrap_or(DEFAULT_LENGTH as usize)
    }

    /// Whether the symbol pool is enabled, defaulting to true.
    #[must_use]
    pub fn symbols_enabled(&self) -> bool {
        self.use_symbols.flatten().unwrap_or(true)
    }

    /// The stored custom password, if one is set and non-empty. An absent
    /// key, a `null`, and an empty string all mean "not set" so that a
    /// cleared field falls back to derivation.
    #[must_use]
    pub fn custom_password(&self) -> Option<&str> {
        self.custom_password
            .as_ref()
            .and_then(|inner| inner.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// The decrypted vault document.
///
/// Root metadata the core never interprets (`flags`, `locker`, `contacts`,
/// `notes`, and anything newer builds add) lives in the flattened `extra`
/// map, which carries explicit `null`s and arbitrary structure through a
/// load/save cycle byte for byte. Canonical key ordering is the codec's
/// concern, not this struct's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultState {
    /// Document format version; bumped by every successful save.
    pub version: u64,
    /// Hex-encoded 256-bit generator seed, fixed at vault creation.
    pub entropy: String,
    #[serde(deserialize_with = "ts::millis")]
    pub last_modified: i64,
    #[serde(default)]
    pub configs: Vec<CredentialRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VaultState {
    /// Create an empty vault with a fresh random entropy seed.
    #[must_use]
    pub fn new() -> Self {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        debug!("Created new vault state");
        Self {
            version: 1,
            entropy: hex::encode(seed),
            last_modified: now_millis(),
            configs: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl Default for VaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Millisecond timestamps, tolerant of fractional values.
///
/// Both original writers emit integer millis, but the dynamic readers they
/// pair with accept any number; a float truncates toward zero here instead
/// of failing the unlock.
mod ts {
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    fn to_millis(n: &Number) -> i64 {
        n.as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(i64::MAX)
    }

    pub fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(to_millis(&Number::deserialize(deserializer)?))
    }

    pub fn opt_millis<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<i64>>, D::Error> {
        let value = Option::<Number>::deserialize(deserializer)?;
        Ok(Some(value.map(|n| to_millis(&n))))
    }
}
