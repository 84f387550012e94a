//! Error types for the vault crate
//!
//! One import point for every error a caller can see. The variants are
//! deliberately coarse at the decryption boundary: a wrong password and a
//! corrupted blob must stay indistinguishable.

// Re-export error types from submodules
pub use crate::codec::CodecError;
pub use crate::crypto::CryptoError;
pub use crate::vault::blob::BlobError;
pub use crate::vault::session::SessionError;
