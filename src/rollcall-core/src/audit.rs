//! Audit events and the sink they are delivered to.
//!
//! Every submission and correction produces exactly one audit event,
//! success or failure, carrying the precise underlying cause even when the
//! caller-facing error code is coalesced. Delivery is fire-and-forget: a
//! sink failure is logged and swallowed, never propagated to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StoreError;

/// Event type constants.
pub mod event_types {
    /// A session was created.
    pub const SESSION_CREATED: &str = "SESSION_CREATED";
    /// Session creation was refused.
    pub const SESSION_CREATE_FAILED: &str = "SESSION_CREATE_FAILED";
    /// A session was explicitly closed.
    pub const SESSION_CLOSED: &str = "SESSION_CLOSED";
    /// A close request was refused.
    pub const SESSION_CLOSE_FAILED: &str = "SESSION_CLOSE_FAILED";
    /// The periodic sweep locked one or more sessions.
    pub const SESSIONS_LOCKED: &str = "SESSIONS_LOCKED";
    /// An attendance submission was committed.
    pub const ATTENDANCE_SUBMITTED: &str = "ATTENDANCE_SUBMITTED";
    /// An attendance submission was refused.
    pub const ATTENDANCE_SUBMIT_FAILED: &str = "ATTENDANCE_SUBMIT_FAILED";
    /// A recorded outcome was amended.
    pub const ATTENDANCE_EDITED: &str = "ATTENDANCE_EDITED";
    /// An amendment request was refused.
    pub const ATTENDANCE_EDIT_FAILED: &str = "ATTENDANCE_EDIT_FAILED";
}

/// One structured audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event type, one of the [`event_types`] constants.
    pub event_type: String,
    /// Session the event concerns, if any.
    pub session_id: Option<String>,
    /// Participant the event concerns, if any.
    pub participant_id: Option<String>,
    /// Free-form structured details.
    pub details: Value,
    /// When the event was produced.
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an event of the given type, stamped now.
    pub fn new(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            session_id: None,
            participant_id: None,
            details: Value::Null,
            at: Utc::now(),
        }
    }

    /// Attach a session id.
    #[must_use]
    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a participant id.
    #[must_use]
    pub fn participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    /// Attach structured details.
    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Destination for audit events.
///
/// Implementations must be safe to call concurrently. Failures are the
/// sink's problem: the engine logs and drops them.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event.
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError>;
}
