//! Stateful components of the conclave orchestrator.
//!
//! This crate owns the per-run transcripts and their turn-alternation state
//! machine, the actor records, the interpreter that extracts directives from
//! completion text, and the gateway that issues outbound Oracle requests and
//! authenticates the callbacks that resume runs.

pub mod actors;
pub mod directive;
pub mod gateway;
pub mod runs;

pub use actors::Actor;
pub use actors::ActorRegistry;
pub use actors::ACTOR_LIMIT;
pub use actors::MESSAGE_LIMIT;
pub use actors::PROTOCOL_HEADER;
pub use directive::parse_directives;
pub use directive::Directive;
pub use directive::DirectiveBudget;
pub use gateway::OracleGateway;
pub use gateway::KB_TOP_K;
pub use runs::ChatRunStore;
pub use runs::NextRequest;
pub use runs::RunState;
