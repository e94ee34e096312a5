//! Per-participant proof-code derivation.
//!
//! A session carries a public 3-digit base code and a random nonce. Each
//! participant's submittable code is the base code shifted by an offset
//! only the server can compute: a keyed MAC over the session nonce using
//! the participant's registration-time secret as the key.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha256;

use crate::constant_time_eq;
use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Proof codes live in [0, 1000): three displayable decimal digits.
pub const BASE_CODE_MODULUS: u32 = 1000;

/// Minimum (and generated) length of a participant secret in bytes.
pub const PARTICIPANT_SECRET_LEN: usize = 32;

/// Length of a generated session nonce in bytes.
pub const SESSION_NONCE_LEN: usize = 16;

/// Derive the per-participant code offset for a session.
///
/// Computes HMAC-SHA256 over the session nonce keyed by the participant
/// secret, interprets the first four digest bytes as a big-endian u32, and
/// reduces modulo [`BASE_CODE_MODULUS`].
///
/// The derivation is deterministic: the same (secret, nonce) pair always
/// yields the same offset, and either input changing changes the offset
/// with overwhelming probability.
///
/// # Errors
///
/// Returns [`CryptoError::SecretTooShort`] if the secret is below
/// [`PARTICIPANT_SECRET_LEN`] bytes, and [`CryptoError::EmptyNonce`] for an
/// empty nonce.
pub fn participant_offset(secret: &[u8], nonce: &[u8]) -> Result<u16, CryptoError> {
    if secret.len() < PARTICIPANT_SECRET_LEN {
        return Err(CryptoError::SecretTooShort {
            len: secret.len(),
            min: PARTICIPANT_SECRET_LEN,
        });
    }
    if nonce.is_empty() {
        return Err(CryptoError::EmptyNonce);
    }

    // HMAC accepts any key length; the length gate above is a policy
    // requirement on secret entropy, not an HMAC constraint.
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| CryptoError::SecretTooShort {
        len: secret.len(),
        min: PARTICIPANT_SECRET_LEN,
    })?;
    mac.update(nonce);
    let digest = mac.finalize().into_bytes();

    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    Ok((prefix % BASE_CODE_MODULUS) as u16)
}

/// Combine a session base code with a participant offset.
///
/// The result is always in [0, 1000).
pub fn expected_code(base_code: u16, offset: u16) -> u16 {
    ((u32::from(base_code) + u32::from(offset)) % BASE_CODE_MODULUS) as u16
}

/// Compare a submitted code against the expected code in constant time.
///
/// Both codes are widened to fixed-length big-endian byte strings before
/// comparison, so the time taken is independent of where a mismatch occurs.
pub fn verify_code(presented: u16, expected: u16) -> bool {
    constant_time_eq(&presented.to_be_bytes(), &expected.to_be_bytes())
}

/// Generate a fresh participant secret (32 bytes of CSPRNG output).
///
/// Generated once at registration and held server-side only.
pub fn generate_participant_secret() -> Vec<u8> {
    let mut secret = vec![0u8; PARTICIPANT_SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    secret
}

/// Generate a fresh session nonce (16 bytes of CSPRNG output).
pub fn generate_session_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; SESSION_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Draw a uniform random base code in [0, 1000).
pub fn random_base_code() -> u16 {
    OsRng.gen_range(0..BASE_CODE_MODULUS) as u16
}
