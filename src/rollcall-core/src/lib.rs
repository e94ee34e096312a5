//! # rollcall-core
//!
//! Core verification logic for Rollcall - the session/attendance
//! verification engine that proves a specific individual was physically
//! present at a specific time and place, without trusting the client
//! device.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   AttendanceEngine                           │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │   Session    │  │   Geodesy    │  │  Proof code  │       │
//! │  │  lifecycle   │  │ (haversine)  │  │ (HMAC offset)│       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │              Submission pipeline                  │       │
//! │  │  (identity → eligibility → freshness → duplicate  │       │
//! │  │   → accuracy → geofence → device → auth → code)   │       │
//! │  └──────────────────────────────────────────────────┘       │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐       │
//! │  │            SessionStore atomic commit             │       │
//! │  │   (record + counters + device binding, or none)   │       │
//! │  └──────────────────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! - **Per-participant codes**: the projected base code is useless without
//!   the server-held participant secret; codes are verified in constant
//!   time.
//! - **Coarse external errors**: authentication, eligibility, and freshness
//!   failures all surface as `NotAuthorized`; the audit trail carries the
//!   precise cause.
//! - **No check-then-act races**: the duplicate-submission guarantee is
//!   enforced by the store's atomic commit, not by a separate pre-check.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod session;
pub mod store;
pub mod types;

pub use audit::{AuditEvent, AuditSink};
pub use config::CoreConfig;
pub use engine::{
    AttendanceEngine, AuthMethod, CorrectionReceipt, CorrectionRequest, CreateSessionRequest,
    CreatedSession, SubmissionReceipt, SubmitRequest,
};
pub use error::AttendanceError;
pub use geo::distance_meters;
pub use session::{Session, SessionScope, SessionStats, SessionStatus};
pub use store::{
    AttestationGate, CommitOutcome, CorrectionUpdate, IdentityStore, IntegrityVerdict,
    SessionStore, StoreError,
};
pub use types::{
    AttendanceOutcome, AttendanceRecord, ClaimedLocation, DeviceBinding, GeoPoint, Participant,
    Role, VerificationFlags,
};
