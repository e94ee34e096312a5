//! Error taxonomy for verification operations.
//!
//! Externally visible failures map onto a small set of stable wire codes.
//! Authentication, role, eligibility, and freshness failures are
//! deliberately coalesced to `ERR_NOT_AUTHORIZED` so a probing caller
//! cannot learn which gate rejected it; the audit trail records the
//! precise variant.

use chrono::{DateTime, Utc};
use thiserror::Error;

use rollcall_crypto::CryptoError;

use crate::session::SessionStatus;
use crate::store::StoreError;

/// Errors produced by the verification pipeline and session operations.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Caller lacks authentication, role, eligibility, or a usable
    /// authentication method.
    #[error("Not authorized: {reason}")]
    NotAuthorized {
        /// Precise cause, for logs and audit only.
        reason: String,
    },

    /// Session is closed or locked and not accepting submissions.
    /// Externally coalesced to not-authorized.
    #[error("Session is {status:?} and not accepting submissions")]
    SessionNotOpen {
        /// The session's current status.
        status: SessionStatus,
    },

    /// Session expired before the submission arrived. Externally coalesced
    /// to not-authorized.
    #[error("Session expired at {expired_at}")]
    SessionExpired {
        /// When the submission window closed.
        expired_at: DateTime<Utc>,
    },

    /// Presented proof code did not match the expected per-participant
    /// code.
    #[error("Invalid proof code")]
    InvalidCode,

    /// Location fix accuracy too coarse to trust; rejected before any
    /// distance computation.
    #[error("Location accuracy {accuracy_m:.0} m exceeds the {max_accuracy_m:.0} m limit")]
    LocationTooCoarse {
        /// Reported accuracy radius of the fix.
        accuracy_m: f64,
        /// Configured accuracy limit.
        max_accuracy_m: f64,
    },

    /// Claimed location outside the session geofence.
    #[error("Location {distance_m:.0} m from session center, radius {radius_m:.0} m")]
    OutOfRange {
        /// Computed great-circle distance, for diagnostics.
        distance_m: f64,
        /// Session geofence radius.
        radius_m: f64,
    },

    /// An attendance record already exists for this (session, subject)
    /// pair.
    #[error("Attendance already recorded for this session")]
    Duplicate,

    /// Presented device fingerprint does not match the stored binding.
    #[error("Device binding mismatch")]
    DeviceMismatch,

    /// Device integrity verdict was negative.
    #[error("Device attestation failed: {reason}")]
    AttestationFailed {
        /// Reason reported by the gate.
        reason: String,
    },

    /// Session is locked; no further correction is possible.
    #[error("Session is locked")]
    SessionLocked,

    /// Correction attempted after the edit window elapsed.
    #[error("Edit window expired at {deadline}")]
    EditWindowExpired {
        /// The edit deadline that has passed.
        deadline: DateTime<Utc>,
    },

    /// A referenced session, participant, or secret does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was missing.
        what: String,
    },

    /// Proof-material derivation failed (internal).
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Store or gate backend failed (internal/transient).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl AttendanceError {
    /// Convenience constructor for authorization failures.
    #[must_use]
    pub fn not_authorized(reason: impl Into<String>) -> Self {
        Self::NotAuthorized {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for missing-entity failures.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Stable wire code reported to callers.
    ///
    /// Freshness and role/eligibility failures intentionally share
    /// `ERR_NOT_AUTHORIZED`; the distinction lives only in logs and audit
    /// events.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthorized { .. } | Self::SessionNotOpen { .. } | Self::SessionExpired { .. } => {
                "ERR_NOT_AUTHORIZED"
            }
            Self::InvalidCode => "ERR_INVALID_CODE",
            Self::LocationTooCoarse { .. } | Self::OutOfRange { .. } => "ERR_OUT_OF_RANGE",
            Self::Duplicate => "ERR_DUPLICATE",
            Self::DeviceMismatch => "ERR_DEVICE_MISMATCH",
            Self::AttestationFailed { .. } => "ERR_ATTESTATION_FAILED",
            Self::SessionLocked => "ERR_SESSION_LOCKED",
            Self::EditWindowExpired { .. } => "ERR_EDIT_WINDOW_EXPIRED",
            Self::NotFound { .. } => "ERR_NOT_FOUND",
            Self::Crypto(_) | Self::Store(_) => "ERR_INTERNAL",
        }
    }

    /// Whether this is a validation outcome (caller-attributable) rather
    /// than an internal failure. Internal failures must never be recorded
    /// as accepted or rejected.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Crypto(_) | Self::Store(_))
    }
}
