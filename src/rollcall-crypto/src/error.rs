//! Error types for proof-code operations.

use thiserror::Error;

/// Errors that can occur while deriving proof material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Participant secret shorter than the required minimum.
    #[error("Participant secret too short: {len} bytes, need at least {min}")]
    SecretTooShort {
        /// Length of the secret that was supplied.
        len: usize,
        /// Minimum acceptable length.
        min: usize,
    },

    /// Session nonce was empty.
    #[error("Session nonce must not be empty")]
    EmptyNonce,
}
