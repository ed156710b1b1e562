//! Error taxonomy for the orchestrator core.

use crate::ids::ActorId;
use crate::ids::RunId;
use thiserror::Error;

/// Errors surfaced by run-store, registry, and gateway operations.
///
/// Two things are deliberately absent: over-budget directives (dropped
/// silently by design, never an error) and Oracle-reported content errors
/// (persisted into the transcript as assistant-visible text, not faults).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConclaveError {
    /// Caller lacks the capability for this operation: not the run's owner,
    /// or not the trusted Oracle.
    #[error("caller is not authorized for this operation")]
    Unauthorized,

    /// The run is not in the awaiting/ready state the operation requires.
    #[error("run {run} is in the wrong state: {detail}")]
    ProtocolState { run: RunId, detail: String },

    #[error("unknown run {0}")]
    UnknownRun(RunId),

    #[error("unknown actor {0}")]
    UnknownActor(ActorId),
}
