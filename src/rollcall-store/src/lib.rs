//! # rollcall-store
//!
//! In-process reference implementations of the Rollcall collaborator
//! contracts: a transactional in-memory store, a fixed-verdict attestation
//! gate, and audit sinks that log or capture events.
//!
//! `MemoryStore` keeps all state behind a single mutex, which makes every
//! store operation a serialized critical section. That is exactly the
//! compare-and-commit primitive the submission pipeline requires: the
//! duplicate check and the record insert happen under one lock, so no
//! check-then-insert window exists. A production deployment replaces this
//! crate with a document store whose transactions provide the same
//! guarantee.
//!
//! Use cases:
//!
//! - Integration and property tests of the core pipeline
//! - Single-node deployments and local development
//! - A behavioral reference when writing a real backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

mod gate;
mod memory;
mod sink;

pub use gate::StaticAttestationGate;
pub use memory::MemoryStore;
pub use sink::{FailingAuditSink, MemoryAuditSink, TracingAuditSink};
