//! # rollcall-crypto
//!
//! Cryptographic primitives for the Rollcall presence-verification core.
//!
//! This crate implements the per-participant rotating proof code:
//!
//! ```text
//! offset        = BE32(HMAC-SHA256(secret, nonce)[0..4]) mod 1000
//! expected_code = (base_code + offset) mod 1000
//! ```
//!
//! The session base code is short and globally displayable (projected to a
//! room); the per-participant offset means no two participants share a
//! submittable code with the same server-side validation path, so observing
//! one participant's code is worth little.
//!
//! ## Security Properties
//!
//! - **Server-held secrets**: participant secrets are generated once at
//!   registration, never transmitted to any client, and must be at least
//!   32 bytes of CSPRNG output.
//! - **Constant-time verification**: submitted codes are compared against
//!   expected codes in constant time to prevent timing side-channels from
//!   leaking partial-match information across repeated attempts.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

mod code;
mod error;
mod pin;

pub use code::{
    expected_code, generate_participant_secret, generate_session_nonce, participant_offset,
    random_base_code, verify_code, BASE_CODE_MODULUS, PARTICIPANT_SECRET_LEN, SESSION_NONCE_LEN,
};
pub use error::CryptoError;
pub use pin::{pin_digest, verify_pin, PIN_DIGEST_LEN};

/// Constant-time byte comparison.
///
/// Compares two byte slices in constant time to prevent timing attacks.
/// Returns `true` if the slices are equal, `false` otherwise.
///
/// # Security
///
/// This function MUST be used for all comparisons of secret-derived values
/// (proof codes, MACs) to prevent timing side-channels.
///
/// Uses the `subtle` crate's `ConstantTimeEq` trait for the comparison.
/// The length check still returns early, but length is typically not secret.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        // Still early-return on length, but length is typically not secret.
        return false;
    }
    a.ct_eq(b).into()
}
