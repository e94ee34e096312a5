//! Fixed-verdict attestation gate.

use async_trait::async_trait;
use tracing::debug;

use rollcall_core::{AttestationGate, IntegrityVerdict, StoreError};

/// An attestation gate that returns a fixed verdict for every token.
///
/// The real gate is an external service; this stand-in exists for tests
/// and for deployments that have not wired one up yet. It never inspects
/// the token.
pub struct StaticAttestationGate {
    verdict: bool,
}

impl StaticAttestationGate {
    /// A gate with the given fixed verdict.
    pub fn new(meets_integrity: bool) -> Self {
        Self {
            verdict: meets_integrity,
        }
    }

    /// A gate that vouches for every device.
    pub fn accepting() -> Self {
        Self::new(true)
    }

    /// A gate that rejects every device.
    pub fn rejecting() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl AttestationGate for StaticAttestationGate {
    async fn verify(&self, _token: &str) -> Result<IntegrityVerdict, StoreError> {
        debug!(meets_integrity = self.verdict, "static attestation verdict");
        Ok(IntegrityVerdict {
            meets_integrity: self.verdict,
        })
    }
}
