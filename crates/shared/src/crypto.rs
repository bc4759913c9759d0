//! Hashing and MAC helpers for request signing.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Computes SHA-256 of the input and returns it base64-encoded.
pub fn sha256_base64(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    STANDARD.encode(hasher.finalize())
}

/// Computes HMAC-SHA256 of `message` under `key` and returns it base64-encoded.
pub fn hmac_sha256_base64(key: &[u8], message: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(message);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
