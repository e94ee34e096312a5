//! PIN digests for the fallback authentication method.
//!
//! Subjects without a usable biometric path authenticate with a short PIN.
//! Only the SHA-256 digest of the PIN is ever stored; verification is a
//! direct equality of fixed-length digests.

use sha2::{Digest, Sha256};

/// Length of a PIN digest in bytes (SHA-256).
pub const PIN_DIGEST_LEN: usize = 32;

/// Compute the storage digest of a PIN.
pub fn pin_digest(pin: &str) -> [u8; PIN_DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.finalize().into()
}

/// Check a presented PIN against a stored digest.
///
/// Digest comparison is a plain fixed-length equality: both sides are
/// 32-byte hashes, not secret-length material.
pub fn verify_pin(pin: &str, stored: &[u8; PIN_DIGEST_LEN]) -> bool {
    pin_digest(pin) == *stored
}
