//! The attendance verification engine.
//!
//! This module implements every public operation of the core:
//!
//! 1. Session creation (organizer-facing)
//! 2. The multi-factor submission pipeline
//! 3. Post-hoc correction of recorded outcomes
//! 4. Explicit session closure
//! 5. The periodic lock sweep
//!
//! The submission pipeline is an ordered sequence of named gates, each a
//! hard stop: identity and role, eligibility, freshness, non-duplication,
//! location accuracy, geofence, device binding, authentication method, and
//! proof code. The first failing gate aborts with a specific error and no
//! side effects beyond a single audit event; when every gate passes, the
//! record, the session counters, and any first-use device binding commit
//! as one atomic store operation.
//!
//! ## Security Properties
//!
//! - External error codes are coarse (`ERR_NOT_AUTHORIZED` covers role,
//!   eligibility, and freshness); audit events carry the precise cause.
//! - Proof codes are verified in constant time.
//! - The duplicate-submission guarantee is the store's atomic commit, not
//!   the pipeline's advisory pre-check.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use rollcall_crypto::{
    expected_code, generate_session_nonce, participant_offset, random_base_code, verify_code,
    verify_pin,
};

use crate::audit::{event_types, AuditEvent, AuditSink};
use crate::config::CoreConfig;
use crate::error::AttendanceError;
use crate::geo::distance_meters;
use crate::session::{Session, SessionScope, SessionStats, SessionStatus};
use crate::store::{
    AttestationGate, CommitOutcome, CorrectionUpdate, IdentityStore, SessionStore,
};
use crate::types::{
    AttendanceOutcome, AttendanceRecord, ClaimedLocation, DeviceBinding, GeoPoint, Participant,
    Role, VerificationFlags,
};

/// How a subject authenticates a submission.
///
/// Exactly one method accompanies every submission; the enum makes the
/// "no method supplied" misconfiguration unrepresentable. A PIN submission
/// against a subject with no stored digest remains the configuration-error
/// path and is refused as not-authorized.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Biometric assertion, vouched for by the external attestation gate.
    Biometric {
        /// Token handed to the attestation gate; the core does not
        /// interpret it.
        attestation_token: String,
    },
    /// PIN fallback, checked against the subject's stored digest.
    Pin {
        /// The presented PIN.
        pin: String,
    },
}

/// A request to open a new session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Organizer opening the session.
    pub organizer_id: String,
    /// Group scoping for the session.
    pub scope: SessionScope,
    /// Display label (course/subject name).
    pub label: String,
    /// Submission window length; defaults to the configured TTL.
    pub ttl: Option<std::time::Duration>,
    /// Geofence radius in meters; defaults to the configured radius.
    pub radius_m: Option<f64>,
    /// Geofence center (the organizer's location).
    pub center: GeoPoint,
}

/// What an organizer gets back from session creation.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    /// Identifier of the new session.
    pub session_id: String,
    /// The public base code to project to the room.
    pub base_code: u16,
    /// When the submission window closes.
    pub expires_at: DateTime<Utc>,
}

impl CreatedSession {
    /// Zero-padded 3-digit display form of the base code.
    pub fn display_code(&self) -> String {
        format!("{:03}", self.base_code)
    }
}

/// A subject's attendance submission.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Target session.
    pub session_id: String,
    /// Authenticated subject submitting.
    pub subject_id: String,
    /// Proof code the subject typed in.
    pub presented_code: u16,
    /// Client-claimed location fix.
    pub location: ClaimedLocation,
    /// Device fingerprint presented by the client.
    pub device_fingerprint: String,
    /// Authentication method accompanying the submission.
    pub auth: AuthMethod,
}

/// Result of an accepted submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    /// Session submitted to.
    pub session_id: String,
    /// Subject whose presence was recorded.
    pub subject_id: String,
    /// Server-side submission time.
    pub submitted_at: DateTime<Utc>,
    /// Computed geofence distance in meters.
    pub distance_m: f64,
    /// Session counters after the commit.
    pub stats: SessionStats,
}

/// A request to amend a recorded outcome.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    /// Session holding the record.
    pub session_id: String,
    /// Subject whose record is amended.
    pub subject_id: String,
    /// Actor performing the amendment.
    pub actor_id: String,
    /// The corrected outcome.
    pub new_outcome: AttendanceOutcome,
    /// Why the outcome is being amended.
    pub reason: String,
}

/// Result of a successful correction.
#[derive(Debug, Clone)]
pub struct CorrectionReceipt {
    /// Session holding the record.
    pub session_id: String,
    /// Subject whose record was amended.
    pub subject_id: String,
    /// The outcome now on record.
    pub outcome: AttendanceOutcome,
    /// When the amendment was stamped.
    pub edited_at: DateTime<Utc>,
}

/// The main verification engine.
///
/// This is the primary entry point for all session and attendance
/// operations. It holds the external collaborators and the policy
/// configuration; all state lives behind the store traits.
pub struct AttendanceEngine {
    /// Policy configuration.
    config: CoreConfig,
    /// Participant and secret lookup.
    identity: Arc<dyn IdentityStore>,
    /// Transactional session/attendance storage.
    store: Arc<dyn SessionStore>,
    /// External device-integrity verdict service.
    gate: Arc<dyn AttestationGate>,
    /// Fire-and-forget audit event sink.
    audit: Arc<dyn AuditSink>,
}

impl AttendanceEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        config: CoreConfig,
        identity: Arc<dyn IdentityStore>,
        store: Arc<dyn SessionStore>,
        gate: Arc<dyn AttestationGate>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            identity,
            store,
            gate,
            audit,
        }
    }

    /// Open a new session for the given scope.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` for a non-organizer caller or an invalid scope,
    /// `NotFound` for an unknown organizer, internal errors from the store.
    #[instrument(skip_all, fields(organizer = %req.organizer_id, label = %req.label))]
    pub async fn create_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<CreatedSession, AttendanceError> {
        let result = self.create_session_inner(&req).await;

        match &result {
            Ok(created) => {
                info!(
                    session_id = %created.session_id,
                    expires_at = %created.expires_at,
                    "session created"
                );
                self.emit(
                    AuditEvent::new(event_types::SESSION_CREATED)
                        .session(created.session_id.clone())
                        .participant(req.organizer_id.clone())
                        .details(json!({
                            "label": req.label,
                            "branch": req.scope.branch,
                            "class_group": req.scope.class_group,
                            "cohorts": req.scope.cohorts,
                            "base_code": created.base_code,
                            "radius_m": req.radius_m.unwrap_or(self.config.default_radius_m),
                        })),
                )
                .await;
            }
            Err(err) => {
                warn!(error = %err, "session creation refused");
                self.emit(
                    AuditEvent::new(event_types::SESSION_CREATE_FAILED)
                        .participant(req.organizer_id.clone())
                        .details(json!({
                            "code": err.code(),
                            "cause": err.to_string(),
                            "label": req.label,
                        })),
                )
                .await;
            }
        }

        result
    }

    async fn create_session_inner(
        &self,
        req: &CreateSessionRequest,
    ) -> Result<CreatedSession, AttendanceError> {
        let organizer = self.require_participant(&req.organizer_id).await?;
        if organizer.role != Role::Organizer {
            return Err(AttendanceError::not_authorized(
                "only organizers can create sessions",
            ));
        }

        req.scope
            .validate()
            .map_err(AttendanceError::not_authorized)?;

        let ttl = req.ttl.unwrap_or(self.config.default_ttl);
        let ttl_chrono = ChronoDuration::from_std(ttl)
            .map_err(|_| AttendanceError::not_authorized("session TTL out of range"))?;
        let edit_window = ChronoDuration::from_std(self.config.edit_window)
            .map_err(|_| AttendanceError::not_authorized("edit window out of range"))?;
        if ttl_chrono >= edit_window {
            return Err(AttendanceError::not_authorized(
                "session TTL must be shorter than the edit window",
            ));
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            organizer_id: organizer.id.clone(),
            scope: req.scope.clone(),
            label: req.label.clone(),
            base_code: random_base_code(),
            nonce: BASE64.encode(generate_session_nonce()),
            created_at: now,
            expires_at: now + ttl_chrono,
            ttl_seconds: ttl.as_secs(),
            edit_deadline: now + edit_window,
            center: req.center,
            radius_m: req.radius_m.unwrap_or(self.config.default_radius_m),
            status: SessionStatus::Open,
            stats: SessionStats::default(),
        };
        session.validate().map_err(AttendanceError::not_authorized)?;

        let created = CreatedSession {
            session_id: session.id.clone(),
            base_code: session.base_code,
            expires_at: session.expires_at,
        };
        self.store.insert_session(session).await?;
        Ok(created)
    }

    /// Run the submission pipeline for one attendance claim.
    ///
    /// # Errors
    ///
    /// One of the stable validation kinds per failing gate, or an internal
    /// error if a collaborator fails. Exactly one audit event is emitted
    /// either way.
    #[instrument(skip_all, fields(session_id = %req.session_id, subject = %req.subject_id))]
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmissionReceipt, AttendanceError> {
        let result = self.submit_inner(&req).await;

        match &result {
            Ok((receipt, newly_bound)) => {
                info!(
                    distance_m = receipt.distance_m,
                    accepted = receipt.stats.accepted_count,
                    attempts = receipt.stats.attempt_count,
                    "attendance accepted"
                );
                self.emit(
                    AuditEvent::new(event_types::ATTENDANCE_SUBMITTED)
                        .session(req.session_id.clone())
                        .participant(req.subject_id.clone())
                        .details(json!({
                            "distance_m": receipt.distance_m.round(),
                            "accuracy_m": req.location.accuracy_m,
                            "presented_code": req.presented_code,
                            "device_bound": newly_bound,
                            "accepted_count": receipt.stats.accepted_count,
                            "attempt_count": receipt.stats.attempt_count,
                        })),
                )
                .await;
            }
            Err(err) => {
                warn!(error = %err, code = err.code(), "attendance refused");
                self.emit(
                    AuditEvent::new(event_types::ATTENDANCE_SUBMIT_FAILED)
                        .session(req.session_id.clone())
                        .participant(req.subject_id.clone())
                        .details(json!({
                            "code": err.code(),
                            "cause": err.to_string(),
                            "presented_code": req.presented_code,
                        })),
                )
                .await;
            }
        }

        result.map(|(receipt, _)| receipt)
    }

    /// The ordered gates. Returns the receipt and whether a first-use
    /// device binding was established.
    async fn submit_inner(
        &self,
        req: &SubmitRequest,
    ) -> Result<(SubmissionReceipt, bool), AttendanceError> {
        let now = Utc::now();

        // Gate 1: identity and role.
        let subject = self.require_participant(&req.subject_id).await?;
        if subject.role != Role::Subject {
            return Err(AttendanceError::not_authorized(
                "only subjects can submit attendance",
            ));
        }

        let session = self
            .store
            .session(&req.session_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("session"))?;

        // Gate 2: eligibility against the session scope.
        if !session.scope.admits(&subject) {
            return Err(AttendanceError::not_authorized(
                "subject outside session scope",
            ));
        }

        // Gate 3: freshness.
        if session.status != SessionStatus::Open {
            return Err(AttendanceError::SessionNotOpen {
                status: session.status,
            });
        }
        if now > session.expires_at {
            return Err(AttendanceError::SessionExpired {
                expired_at: session.expires_at,
            });
        }

        // Gate 4: non-duplication. Advisory fast path; the binding
        // guarantee is the store's atomic commit below.
        if self
            .store
            .attendance(&req.session_id, &req.subject_id)
            .await?
            .is_some()
        {
            return Err(AttendanceError::Duplicate);
        }

        // Gate 5: location accuracy, before any distance math.
        if req.location.accuracy_m > self.config.min_accuracy_m {
            return Err(AttendanceError::LocationTooCoarse {
                accuracy_m: req.location.accuracy_m,
                max_accuracy_m: self.config.min_accuracy_m,
            });
        }

        // Gate 6: geofence, boundary inclusive.
        let distance_m = distance_meters(req.location.point(), session.center);
        if distance_m > session.radius_m {
            return Err(AttendanceError::OutOfRange {
                distance_m,
                radius_m: session.radius_m,
            });
        }
        debug!(distance_m, radius_m = session.radius_m, "geofence passed");

        // Gate 7: device binding, first use binds.
        let new_binding = match &subject.device_binding {
            None => Some(DeviceBinding {
                fingerprint: req.device_fingerprint.clone(),
                platform: "unknown".to_string(),
                bound_at: now,
            }),
            Some(binding) if binding.fingerprint == req.device_fingerprint => None,
            Some(_) => return Err(AttendanceError::DeviceMismatch),
        };

        // Gate 8: authentication method.
        match &req.auth {
            AuthMethod::Biometric { attestation_token } => {
                let verdict = self.gate.verify(attestation_token).await?;
                if !verdict.meets_integrity {
                    return Err(AttendanceError::AttestationFailed {
                        reason: "device integrity verdict negative".to_string(),
                    });
                }
            }
            AuthMethod::Pin { pin } => {
                let digest = subject.pin_digest.as_ref().ok_or_else(|| {
                    AttendanceError::not_authorized("PIN not configured for subject")
                })?;
                if !verify_pin(pin, digest) {
                    return Err(AttendanceError::not_authorized("invalid PIN"));
                }
            }
        }

        // Gate 9: proof code, constant-time.
        let secret = self
            .identity
            .participant_secret(&req.subject_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("participant secret"))?;
        let offset = participant_offset(&secret, session.nonce.as_bytes())?;
        let expected = expected_code(session.base_code, offset);
        if !verify_code(req.presented_code, expected) {
            return Err(AttendanceError::InvalidCode);
        }

        // All gates passed: one atomic commit.
        let record = AttendanceRecord {
            session_id: req.session_id.clone(),
            subject_id: req.subject_id.clone(),
            submitted_at: now,
            presented_code: req.presented_code,
            device_fingerprint: req.device_fingerprint.clone(),
            distance_m,
            flags: VerificationFlags::all_passed(),
            outcome: AttendanceOutcome::Accepted,
            reason: None,
            edited_by: None,
            edited_at: None,
        };
        let newly_bound = new_binding.is_some();
        let commit = self
            .store
            .commit_submission(record, new_binding.map(|b| (subject.id.clone(), b)))
            .await?;

        match commit {
            CommitOutcome::Committed { stats } => Ok((
                SubmissionReceipt {
                    session_id: req.session_id.clone(),
                    subject_id: req.subject_id.clone(),
                    submitted_at: now,
                    distance_m,
                    stats,
                },
                newly_bound,
            )),
            CommitOutcome::Duplicate => Err(AttendanceError::Duplicate),
        }
    }

    /// Amend a recorded outcome within the edit window.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` for an actor without standing, `SessionLocked` past
    /// lock, `EditWindowExpired` past the deadline, `NotFound` if no record
    /// exists for the pair.
    #[instrument(skip_all, fields(session_id = %req.session_id, subject = %req.subject_id, actor = %req.actor_id))]
    pub async fn correct(
        &self,
        req: CorrectionRequest,
    ) -> Result<CorrectionReceipt, AttendanceError> {
        let result = self.correct_inner(&req).await;

        match &result {
            Ok(receipt) => {
                info!(outcome = ?receipt.outcome, "attendance record amended");
                self.emit(
                    AuditEvent::new(event_types::ATTENDANCE_EDITED)
                        .session(req.session_id.clone())
                        .participant(req.subject_id.clone())
                        .details(json!({
                            "actor": req.actor_id,
                            "new_outcome": receipt.outcome,
                            "reason": req.reason,
                        })),
                )
                .await;
            }
            Err(err) => {
                warn!(error = %err, code = err.code(), "correction refused");
                self.emit(
                    AuditEvent::new(event_types::ATTENDANCE_EDIT_FAILED)
                        .session(req.session_id.clone())
                        .participant(req.subject_id.clone())
                        .details(json!({
                            "actor": req.actor_id,
                            "code": err.code(),
                            "cause": err.to_string(),
                        })),
                )
                .await;
            }
        }

        result
    }

    async fn correct_inner(
        &self,
        req: &CorrectionRequest,
    ) -> Result<CorrectionReceipt, AttendanceError> {
        let now = Utc::now();

        let actor = self.require_participant(&req.actor_id).await?;
        let session = self
            .store
            .session(&req.session_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("session"))?;

        let authorized = match actor.role {
            Role::Operator => true,
            Role::Organizer => session.organizer_id == actor.id,
            Role::Subject => false,
        };
        if !authorized {
            return Err(AttendanceError::not_authorized(
                "actor may not amend this session",
            ));
        }

        if session.status == SessionStatus::Locked {
            return Err(AttendanceError::SessionLocked);
        }
        if session.past_edit_window(now) {
            return Err(AttendanceError::EditWindowExpired {
                deadline: session.edit_deadline,
            });
        }

        let updated = self
            .store
            .apply_correction(
                &req.session_id,
                &req.subject_id,
                CorrectionUpdate {
                    outcome: req.new_outcome,
                    reason: req.reason.clone(),
                    edited_by: actor.id.clone(),
                    edited_at: now,
                },
            )
            .await?
            .ok_or_else(|| AttendanceError::not_found("attendance record"))?;

        Ok(CorrectionReceipt {
            session_id: req.session_id.clone(),
            subject_id: req.subject_id.clone(),
            outcome: updated.outcome,
            edited_at: now,
        })
    }

    /// Explicitly close a session, stopping further submissions. Closed is
    /// not locked: corrections stay possible until the edit window ends.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` for an actor without standing, `SessionLocked` if
    /// the session has already locked, `NotFound` for an unknown session.
    #[instrument(skip(self))]
    pub async fn close_session(
        &self,
        session_id: &str,
        actor_id: &str,
    ) -> Result<(), AttendanceError> {
        let result = self.close_session_inner(session_id, actor_id).await;

        match &result {
            Ok(()) => {
                info!("session closed");
                self.emit(
                    AuditEvent::new(event_types::SESSION_CLOSED)
                        .session(session_id.to_string())
                        .participant(actor_id.to_string()),
                )
                .await;
            }
            Err(err) => {
                warn!(error = %err, "session close refused");
                self.emit(
                    AuditEvent::new(event_types::SESSION_CLOSE_FAILED)
                        .session(session_id.to_string())
                        .participant(actor_id.to_string())
                        .details(json!({
                            "code": err.code(),
                            "cause": err.to_string(),
                        })),
                )
                .await;
            }
        }

        result
    }

    async fn close_session_inner(
        &self,
        session_id: &str,
        actor_id: &str,
    ) -> Result<(), AttendanceError> {
        let actor = self.require_participant(actor_id).await?;
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("session"))?;

        let authorized = match actor.role {
            Role::Operator => true,
            Role::Organizer => session.organizer_id == actor.id,
            Role::Subject => false,
        };
        if !authorized {
            return Err(AttendanceError::not_authorized(
                "actor may not close this session",
            ));
        }

        if session.status == SessionStatus::Locked {
            return Err(AttendanceError::SessionLocked);
        }

        // Idempotent: closing an already-closed session is a no-op.
        self.store
            .advance_status(session_id, SessionStatus::Closed)
            .await?;
        Ok(())
    }

    /// Advance every session whose edit window has elapsed to `Locked`.
    ///
    /// Intended to run on a periodic cadence (hourly is a reasonable
    /// default). Idempotent: sweeping twice in a row locks nothing new.
    /// Returns the number of sessions newly locked.
    ///
    /// The sweep may race in-flight submissions. Locking gates
    /// corrections, not the submission window, so a submission that
    /// already passed the freshness check against `expires_at` commits
    /// normally even if the sweep locks its session mid-flight.
    ///
    /// # Errors
    ///
    /// Internal store errors only.
    #[instrument(skip(self))]
    pub async fn sweep_expired_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, AttendanceError> {
        let due = self.store.sessions_past_edit_window(now).await?;
        let mut locked = 0u64;
        for session_id in due {
            if self
                .store
                .advance_status(&session_id, SessionStatus::Locked)
                .await?
            {
                debug!(session_id = %session_id, "session locked");
                locked += 1;
            }
        }

        if locked > 0 {
            info!(locked, "lock sweep complete");
            self.emit(
                AuditEvent::new(event_types::SESSIONS_LOCKED)
                    .details(json!({ "locked": locked })),
            )
            .await;
        }
        Ok(locked)
    }

    /// The organizer's currently open, unexpired sessions.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` for a non-organizer caller, `NotFound` for an
    /// unknown caller, internal errors from the store.
    #[instrument(skip(self))]
    pub async fn active_sessions(
        &self,
        organizer_id: &str,
    ) -> Result<Vec<Session>, AttendanceError> {
        let organizer = self.require_participant(organizer_id).await?;
        if organizer.role != Role::Organizer {
            return Err(AttendanceError::not_authorized(
                "only organizers can list their sessions",
            ));
        }
        Ok(self
            .store
            .active_sessions_for(organizer_id, Utc::now())
            .await?)
    }

    /// Fetch a participant that must exist and be active.
    async fn require_participant(&self, id: &str) -> Result<Participant, AttendanceError> {
        let participant = self
            .identity
            .participant(id)
            .await?
            .ok_or_else(|| AttendanceError::not_found("participant"))?;
        if !participant.active {
            return Err(AttendanceError::not_authorized("account is inactive"));
        }
        Ok(participant)
    }

    /// Deliver an audit event, logging and swallowing sink failures.
    async fn emit(&self, event: AuditEvent) {
        if let Err(err) = self.audit.record(event).await {
            warn!(error = %err, "audit sink failed; event dropped");
        }
    }
}
