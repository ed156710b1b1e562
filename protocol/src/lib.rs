//! Wire-level types for the conclave orchestrator core.
//!
//! Everything that crosses the Oracle boundary (requests, responses, config
//! sentinels) or identifies an entity (runs, actors, callers) lives in this
//! crate so the stateful core and the composition runtime share one
//! vocabulary.

mod error;
mod ids;
mod message;
mod oracle;

pub use error::ConclaveError;
pub use ids::ActorId;
pub use ids::CallerId;
pub use ids::RunId;
pub use message::Message;
pub use message::Role;
pub use oracle::CompletionConfig;
pub use oracle::CompletionResponse;
pub use oracle::OracleRequest;
pub use oracle::PendingRequest;
pub use oracle::PENALTY_DISABLED_OVER;
pub use oracle::SEED_UNSET;
pub use oracle::TEMPERATURE_SCALE;
pub use oracle::TOP_P_DISABLED_OVER;
