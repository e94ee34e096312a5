//! Session documents and their lifecycle rules.
//!
//! A session is a time-boxed verification window scoped to a group. Its
//! status only ever moves forward:
//!
//! ```text
//! Open ──organizer close──▶ Closed ──sweep past edit deadline──▶ Locked
//!   └──────────────sweep past edit deadline─────────────────────▶ Locked
//! ```
//!
//! `Closed` is not `Locked`: a closed session stops accepting submissions
//! but may still be corrected until the edit window elapses. `Locked` is
//! terminal and forbids any further correction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rollcall_crypto::BASE_CODE_MODULUS;

use crate::types::{GeoPoint, Participant};

/// Lifecycle status of a session. Ordering is the transition order;
/// transitions never move backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Accepting submissions (until expiry).
    Open,
    /// Explicitly closed by the organizer; still correctable.
    Closed,
    /// Edit window elapsed; terminal.
    Locked,
}

impl SessionStatus {
    /// Whether a transition from `self` to `to` moves the lifecycle
    /// forward. Same-state "transitions" are not advances.
    pub fn can_advance_to(self, to: SessionStatus) -> bool {
        to > self
    }
}

/// Group scoping of a session: one branch, one class group, one or more
/// cohorts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScope {
    /// Branch the session is held for.
    pub branch: String,
    /// Class group within the branch.
    pub class_group: String,
    /// Cohorts admitted to the session; must be non-empty.
    pub cohorts: Vec<String>,
}

impl SessionScope {
    /// Validate the scope shape.
    ///
    /// # Errors
    ///
    /// Returns a static description of the first violation found.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.branch.trim().is_empty() {
            return Err("branch must not be empty");
        }
        if self.class_group.trim().is_empty() {
            return Err("class group must not be empty");
        }
        if self.cohorts.is_empty() {
            return Err("at least one cohort must be selected");
        }
        if self.cohorts.iter().any(|c| c.trim().is_empty()) {
            return Err("cohort ids must not be empty");
        }
        Ok(())
    }

    /// Whether a participant's group membership falls inside this scope.
    pub fn admits(&self, participant: &Participant) -> bool {
        participant.branch == self.branch
            && participant.class_group == self.class_group
            && self.cohorts.iter().any(|c| *c == participant.cohort)
    }
}

/// Running counters on a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Submissions committed with an accepted outcome.
    pub accepted_count: u64,
    /// Total committed submission attempts.
    pub attempt_count: u64,
}

/// A time-boxed attendance-collection window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Organizer who owns the session.
    pub organizer_id: String,
    /// Group scoping.
    pub scope: SessionScope,
    /// Display label (course/subject name).
    pub label: String,
    /// Public 3-digit base code, in [0, 1000).
    pub base_code: u16,
    /// Random per-session nonce, base64-encoded; the MAC input for
    /// per-participant code derivation.
    pub nonce: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Submission cut-off.
    pub expires_at: DateTime<Utc>,
    /// Requested TTL in seconds (informational; `expires_at` governs).
    pub ttl_seconds: u64,
    /// Correction cut-off; strictly later than `expires_at`.
    pub edit_deadline: DateTime<Utc>,
    /// Geofence center.
    pub center: GeoPoint,
    /// Geofence radius in meters (inclusive boundary).
    pub radius_m: f64,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Running counters.
    pub stats: SessionStats,
}

impl Session {
    /// Validate the structural invariants of a session document.
    ///
    /// # Errors
    ///
    /// Returns a static description of the first violation found.
    pub fn validate(&self) -> Result<(), &'static str> {
        self.scope.validate()?;
        if u32::from(self.base_code) >= BASE_CODE_MODULUS {
            return Err("base code outside displayable range");
        }
        if self.nonce.is_empty() {
            return Err("nonce must not be empty");
        }
        if self.expires_at <= self.created_at {
            return Err("expiry must be after creation");
        }
        if self.edit_deadline <= self.expires_at {
            return Err("edit deadline must be after expiry");
        }
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err("radius must be positive");
        }
        Ok(())
    }

    /// Whether the session accepts submissions at `now`: status `Open` and
    /// not past expiry (boundary inclusive).
    pub fn accepts_submissions(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Open && now <= self.expires_at
    }

    /// Whether outcomes may still be corrected at `now`: not locked and
    /// not past the edit deadline (boundary inclusive).
    pub fn correctable(&self, now: DateTime<Utc>) -> bool {
        self.status != SessionStatus::Locked && now <= self.edit_deadline
    }

    /// Whether the edit window has elapsed at `now`.
    pub fn past_edit_window(&self, now: DateTime<Utc>) -> bool {
        now > self.edit_deadline
    }

    /// Zero-padded 3-digit display form of the base code.
    pub fn display_code(&self) -> String {
        format!("{:03}", self.base_code)
    }
}
