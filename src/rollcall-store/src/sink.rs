//! Audit sink implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use rollcall_core::{AuditEvent, AuditSink, StoreError};

/// Sink that mirrors every audit event into the tracing log.
#[derive(Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    /// Create a tracing sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError> {
        info!(
            event_type = %event.event_type,
            session_id = ?event.session_id,
            participant_id = ?event.participant_id,
            details = %event.details,
            "audit event"
        );
        Ok(())
    }
}

/// Sink that captures events in memory, for assertions in tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Create an empty capturing sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events of the given type.
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.events
            .lock()
            .map_err(|_| StoreError::unavailable("audit sink lock poisoned"))?
            .push(event);
        Ok(())
    }
}

/// Sink that fails every record call.
///
/// Exists to prove the engine treats audit delivery as fire-and-forget: a
/// sink outage must never surface to submitters.
#[derive(Default)]
pub struct FailingAuditSink;

impl FailingAuditSink {
    /// Create a failing sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<(), StoreError> {
        Err(StoreError::unavailable("audit sink offline"))
    }
}
