//! Single-mutex in-memory store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rollcall_core::{
    AttendanceOutcome, AttendanceRecord, CommitOutcome, CorrectionUpdate, DeviceBinding,
    IdentityStore, Participant, Session, SessionStatus, SessionStore, StoreError,
};

/// All state held by a [`MemoryStore`].
#[derive(Default)]
struct Inner {
    participants: HashMap<String, Participant>,
    secrets: HashMap<String, Vec<u8>>,
    sessions: HashMap<String, Session>,
    /// Attendance records keyed by (session, subject).
    attendance: HashMap<(String, String), AttendanceRecord>,
}

/// In-memory implementation of [`IdentityStore`] and [`SessionStore`].
///
/// Every operation takes the single internal lock, so the duplicate check,
/// record insert, counter increments, and binding write of
/// [`SessionStore::commit_submission`] form one critical section. Under
/// concurrent submissions for the same (session, subject) pair, exactly
/// one caller commits; the rest observe the record and get
/// [`CommitOutcome::Duplicate`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a participant document.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn upsert_participant(&self, participant: Participant) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .participants
            .insert(participant.id.clone(), participant);
        Ok(())
    }

    /// Set the code-derivation secret for a participant.
    ///
    /// # Errors
    ///
    /// Fails only if the store lock is poisoned.
    pub fn set_participant_secret(
        &self,
        participant_id: impl Into<String>,
        secret: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.secrets.insert(participant_id.into(), secret);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::unavailable("store lock poisoned"))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn participant(&self, id: &str) -> Result<Option<Participant>, StoreError> {
        Ok(self.lock()?.participants.get(id).cloned())
    }

    async fn participant_secret(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.secrets.get(id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.sessions.get(id).cloned())
    }

    async fn attendance(
        &self,
        session_id: &str,
        subject_id: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let key = (session_id.to_string(), subject_id.to_string());
        Ok(self.lock()?.attendance.get(&key).cloned())
    }

    async fn commit_submission(
        &self,
        record: AttendanceRecord,
        new_binding: Option<(String, DeviceBinding)>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.lock()?;

        let key = (record.session_id.clone(), record.subject_id.clone());
        if inner.attendance.contains_key(&key) {
            return Ok(CommitOutcome::Duplicate);
        }

        // All-or-nothing: verify every write target before touching state.
        if let Some((participant_id, _)) = &new_binding {
            if !inner.participants.contains_key(participant_id.as_str()) {
                return Err(StoreError::aborted(
                    "participant disappeared before binding write",
                ));
            }
        }
        let Some(session) = inner.sessions.get_mut(&record.session_id) else {
            return Err(StoreError::missing("session"));
        };

        if record.outcome == AttendanceOutcome::Accepted {
            session.stats.accepted_count += 1;
        }
        session.stats.attempt_count += 1;
        let stats = session.stats;

        if let Some((participant_id, binding)) = new_binding {
            if let Some(participant) = inner.participants.get_mut(&participant_id) {
                participant.device_binding = Some(binding);
            }
        }
        inner.attendance.insert(key, record);

        Ok(CommitOutcome::Committed { stats })
    }

    async fn apply_correction(
        &self,
        session_id: &str,
        subject_id: &str,
        update: CorrectionUpdate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let mut inner = self.lock()?;

        let key = (session_id.to_string(), subject_id.to_string());
        let Some(record) = inner.attendance.get_mut(&key) else {
            return Ok(None);
        };

        let previous = record.outcome;
        record.outcome = update.outcome;
        record.reason = Some(update.reason);
        record.edited_by = Some(update.edited_by);
        record.edited_at = Some(update.edited_at);
        let updated = record.clone();

        // Keep the accepted counter consistent with the corrected outcome,
        // inside the same critical section as the rewrite.
        if previous != update.outcome {
            if let Some(session) = inner.sessions.get_mut(session_id) {
                match update.outcome {
                    AttendanceOutcome::Accepted => session.stats.accepted_count += 1,
                    AttendanceOutcome::Rejected => {
                        session.stats.accepted_count = session.stats.accepted_count.saturating_sub(1);
                    }
                }
            }
        }

        Ok(Some(updated))
    }

    async fn advance_status(
        &self,
        session_id: &str,
        to: SessionStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(session) = inner.sessions.get_mut(session_id) else {
            return Err(StoreError::missing("session"));
        };
        if session.status.can_advance_to(to) {
            session.status = to;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn sessions_past_edit_window(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.status != SessionStatus::Locked && s.past_edit_window(now))
            .map(|s| s.id.clone())
            .collect())
    }

    async fn active_sessions_for(
        &self,
        organizer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, StoreError> {
        let inner = self.lock()?;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| {
                s.organizer_id == organizer_id
                    && s.status == SessionStatus::Open
                    && now <= s.expires_at
            })
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }
}
