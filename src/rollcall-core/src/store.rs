//! Collaborator contracts consumed by the engine.
//!
//! The core owns no persistence and verifies no attestation tokens itself;
//! it drives these traits. Backends are expected to be remote document
//! stores or services; the `rollcall-store` crate holds in-process
//! implementations for tests and single-node deployments.
//!
//! ## The atomic commit contract
//!
//! [`SessionStore::commit_submission`] is the single mutation boundary of
//! the submission pipeline. Implementations MUST perform the duplicate
//! check, the record insert, the counter increments, and the optional
//! first-use device-binding write as one atomic unit: under concurrent
//! submissions for the same (session, subject) pair, exactly one call may
//! observe "no existing record" and commit; every other call must report
//! [`CommitOutcome::Duplicate`]. A check-then-insert race window is a
//! contract violation, not a caller bug.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::session::{Session, SessionStatus};
use crate::types::{AttendanceOutcome, AttendanceRecord, DeviceBinding, Participant};

/// Errors surfaced by store and gate backends.
///
/// These are internal/transient failures, distinct from the validation
/// error kinds: a commit failure after all gates pass is reported to the
/// caller as internal and is never recorded as accepted or rejected.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or refusing service.
    #[error("Store unavailable: {reason}")]
    Unavailable {
        /// Reason the backend is unavailable.
        reason: String,
    },

    /// A transaction could not be committed.
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason the transaction was aborted.
        reason: String,
    },

    /// A document the operation depends on is missing.
    #[error("Missing document: {what}")]
    MissingDocument {
        /// Description of the missing document.
        what: String,
    },
}

impl StoreError {
    /// Create an unavailability error from a reason.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a transaction-aborted error from a reason.
    #[must_use]
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Create a missing-document error.
    #[must_use]
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingDocument { what: what.into() }
    }
}

/// Participant and secret lookup.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch a participant by id. `Ok(None)` means the id is unknown.
    async fn participant(&self, id: &str) -> Result<Option<Participant>, StoreError>;

    /// Fetch the server-held code-derivation secret for a participant.
    ///
    /// The secret never travels with the participant document and is never
    /// sent to any client.
    async fn participant_secret(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Result of an atomic submission commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The record was created; counters reflect the commit.
    Committed {
        /// Session counters after the commit.
        stats: crate::session::SessionStats,
    },
    /// A record for this (session, subject) pair already exists; nothing
    /// was written.
    Duplicate,
}

/// Fields rewritten by a post-hoc correction.
#[derive(Debug, Clone)]
pub struct CorrectionUpdate {
    /// The corrected outcome.
    pub outcome: AttendanceOutcome,
    /// Why the outcome was amended.
    pub reason: String,
    /// Actor performing the amendment.
    pub edited_by: String,
    /// When the amendment was made.
    pub edited_at: DateTime<Utc>,
}

/// Transactional storage for sessions and attendance records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session.
    async fn insert_session(&self, session: Session) -> Result<(), StoreError>;

    /// Fetch a session by id. `Ok(None)` means the id is unknown.
    async fn session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Fetch the attendance record for a (session, subject) pair, if any.
    async fn attendance(
        &self,
        session_id: &str,
        subject_id: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Atomically commit a submission: insert the record, increment the
    /// session counters, and persist a first-use device binding if one was
    /// established. See the module docs for the atomicity contract.
    async fn commit_submission(
        &self,
        record: AttendanceRecord,
        new_binding: Option<(String, DeviceBinding)>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Atomically rewrite a record's outcome and correction stamps,
    /// recomputing the session's accepted counter when the outcome flips.
    /// Returns the updated record, or `Ok(None)` if no record exists for
    /// the pair.
    async fn apply_correction(
        &self,
        session_id: &str,
        subject_id: &str,
        update: CorrectionUpdate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Advance a session's status, refusing backward transitions. Returns
    /// `true` if a transition occurred, `false` if the session was already
    /// at or past `to` (making sweeps idempotent).
    async fn advance_status(
        &self,
        session_id: &str,
        to: SessionStatus,
    ) -> Result<bool, StoreError>;

    /// Ids of every non-locked session whose edit deadline is before
    /// `now`; the sweep's work list.
    async fn sessions_past_edit_window(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>;

    /// The organizer's currently open, unexpired sessions.
    async fn active_sessions_for(
        &self,
        organizer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError>;
}

/// Verdict from the external device-integrity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityVerdict {
    /// Whether the device/app met the integrity bar.
    pub meets_integrity: bool,
}

/// External device-attestation service, consumed as an already-validated
/// verdict. The core never re-derives or second-guesses it.
#[async_trait]
pub trait AttestationGate: Send + Sync {
    /// Verify an attestation token and return the integrity verdict.
    /// Transport failures surface as [`StoreError`] and are reported to
    /// the caller as internal, not as a negative verdict.
    async fn verify(&self, token: &str) -> Result<IntegrityVerdict, StoreError>;
}
