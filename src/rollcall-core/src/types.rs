//! Domain types shared across the verification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rollcall_crypto::PIN_DIGEST_LEN;

/// Role a participant holds within the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Runs sessions and may amend recorded outcomes for them.
    Organizer,
    /// Submits attendance.
    Subject,
    /// Operational staff; may amend outcomes for any session.
    Operator,
}

/// A persisted fingerprint tying a subject to one physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    /// Opaque installation-id hash presented by the device.
    pub fingerprint: String,
    /// Client platform label (advisory, supplied by the client).
    pub platform: String,
    /// When the binding was first recorded.
    pub bound_at: DateTime<Utc>,
}

/// A registered identity, as served by the identity store.
///
/// The per-participant secret used for code derivation is deliberately not
/// a field here; it is fetched separately through
/// [`crate::store::IdentityStore::participant_secret`] and never travels
/// with the participant document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Stable participant identifier.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Role held by this participant.
    pub role: Role,
    /// Branch the participant belongs to.
    pub branch: String,
    /// Class group within the branch.
    pub class_group: String,
    /// Cohort within the class group.
    pub cohort: String,
    /// Device binding, once established.
    pub device_binding: Option<DeviceBinding>,
    /// SHA-256 digest of the participant's PIN, if one is set.
    pub pin_digest: Option<[u8; PIN_DIGEST_LEN]>,
    /// Whether the account is active.
    pub active: bool,
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

/// A client-claimed location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimedLocation {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Reported accuracy radius of the fix, in meters.
    pub accuracy_m: f64,
}

impl ClaimedLocation {
    /// The claimed coordinates without the accuracy component.
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Which checks a submission passed, recorded with the attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFlags {
    /// Session was open and unexpired.
    pub time_ok: bool,
    /// Proof code matched.
    pub code_ok: bool,
    /// Device fingerprint matched (or was bound first-use).
    pub device_ok: bool,
    /// Device integrity verdict (or PIN fallback) was positive.
    pub integrity_ok: bool,
    /// Location was accurate and inside the geofence.
    pub location_ok: bool,
}

impl VerificationFlags {
    /// Flags for a submission that cleared every gate.
    pub fn all_passed() -> Self {
        Self {
            time_ok: true,
            code_ok: true,
            device_ok: true,
            integrity_ok: true,
            location_ok: true,
        }
    }
}

/// Final outcome of an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceOutcome {
    /// Presence verified.
    Accepted,
    /// Presence rejected (only reachable through post-hoc correction).
    Rejected,
}

/// One attendance record, keyed by (session, subject).
///
/// Immutable once committed, except through the post-hoc correction path
/// which rewrites `outcome`/`reason` and stamps `edited_by`/`edited_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Session this record belongs to.
    pub session_id: String,
    /// Subject who submitted.
    pub subject_id: String,
    /// Server-side submission time.
    pub submitted_at: DateTime<Utc>,
    /// The proof code the subject presented.
    pub presented_code: u16,
    /// Device fingerprint presented with the submission.
    pub device_fingerprint: String,
    /// Geofence distance computed at submission time, in meters.
    pub distance_m: f64,
    /// Per-check verification results.
    pub flags: VerificationFlags,
    /// Accepted or rejected.
    pub outcome: AttendanceOutcome,
    /// Rejection or correction reason, if any.
    pub reason: Option<String>,
    /// Actor who last corrected this record.
    pub edited_by: Option<String>,
    /// When the record was last corrected.
    pub edited_at: Option<DateTime<Utc>>,
}
