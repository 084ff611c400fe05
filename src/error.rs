//! Error types for the alert engine.
//!
//! Every failure is strongly typed so the orchestrator can pattern match
//! on the recovery policy: provider failures skip the alert for one cycle,
//! storage failures abort that single alert's evaluation, malformed
//! records are flagged and skipped, caller errors surface synchronously.

use thiserror::Error;

use crate::services::kv::StoreError;
use crate::services::providers::ProviderError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Recovered per alert: the alert is skipped this cycle, no state
    /// change, no event.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Fatal for a single alert's evaluation; the sweep continues.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Malformed alert record (missing fields, wrong variant for the
    /// requested operation). Flagged and skipped, never crashes a sweep.
    #[error("invalid alert record {id}: {reason}")]
    InvalidAlert { id: String, reason: String },

    /// Rejected caller input (bad create request, bad partial update).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),
}
