//! Shared helpers and configuration loading.

/// TOML configuration schema, validation and hot reload.
pub mod toml_config;

use sha2::{Digest, Sha256};

/// Stable 64-bit seed derived from the given parts.
///
/// Used wherever "random-looking" output must be reproducible for the same
/// query text, such as fallback items and the offline narrative.
pub fn stable_seed(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Hex digest used for cache keys.
pub fn digest_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    format!("{:x}", hasher.finalize())
}
