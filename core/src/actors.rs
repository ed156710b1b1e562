//! Actor records, prompt composition, and the run-to-actor correlation.

use conclave_protocol::ActorId;
use conclave_protocol::ConclaveError;
use conclave_protocol::RunId;
use serde::Serialize;
use std::collections::HashMap;

/// Per-response cap on `create` directives.
pub const ACTOR_LIMIT: u32 = 2;
/// Per-response cap on `message` directives.
pub const MESSAGE_LIMIT: u32 = 5;

/// Instructional preamble prefixed to every actor-authored prompt. This is
/// what teaches the completion provider the directive grammar the interpreter
/// understands.
pub const PROTOCOL_HEADER: &str = "You are one actor in a network of cooperating agents. \
To act on the network, embed directives in your reply using the form |COMMAND|<verb>|<args>|. \
Verbs: |COMMAND|introspect|<new context>| replaces your own working context wholesale; \
|COMMAND|message|<actor id>|<text>| delivers text to another actor; \
|COMMAND|create|<system prompt>|<initial context>| registers a new actor. \
Everything outside directives is ordinary reply text.\n\n";

/// A reusable agent identity: an immutable system prompt, a mutable working
/// context, and the runs it has initiated or received.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub id: ActorId,
    pub system_prompt: String,
    pub context: String,
    pub spawned_run_ids: Vec<RunId>,
    /// Per-response directive caps. Initialized from the global constants;
    /// the budget reads these rather than the globals.
    pub spawn_limit: u32,
    pub message_limit: u32,
}

/// Arena of all actors plus the run-to-actor correlation used to resolve the
/// acting actor for directives. Ids are dense indexes; actors are never
/// deleted.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    actors: Vec<Actor>,
    triggered_by: HashMap<RunId, ActorId>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new actor under the next sequential id.
    pub fn create_actor(&mut self, system_prompt: &str, initial_context: &str) -> ActorId {
        let id = ActorId(self.actors.len() as u64);
        self.actors.push(Actor {
            id,
            system_prompt: system_prompt.to_string(),
            context: initial_context.to_string(),
            spawned_run_ids: Vec::new(),
            spawn_limit: ACTOR_LIMIT,
            message_limit: MESSAGE_LIMIT,
        });
        tracing::info!(actor = %id, "registered actor");
        id
    }

    /// Composite prompt for delivering `text` to an actor: protocol header,
    /// identity, working context, the incoming text, and the current network
    /// size.
    pub fn compose_prompt(&self, actor: ActorId, text: &str) -> Result<String, ConclaveError> {
        let actor = self.info(actor)?;
        Ok(format!(
            "{PROTOCOL_HEADER}{system_prompt}\n\nContext: {context}\n\nMessage: {text}\n\nActors in the network: {count}",
            system_prompt = actor.system_prompt,
            context = actor.context,
            count = self.actors.len(),
        ))
    }

    /// Wholesale context replacement. No merge, no history kept.
    pub fn introspect(&mut self, actor: ActorId, new_context: &str) -> Result<(), ConclaveError> {
        self.info_mut(actor)?.context = new_context.to_string();
        Ok(())
    }

    /// Appends a run to the actor's spawned-run list.
    pub fn link_run(&mut self, actor: ActorId, run: RunId) -> Result<(), ConclaveError> {
        self.info_mut(actor)?.spawned_run_ids.push(run);
        Ok(())
    }

    /// Records which actor triggered a run. Immutable once set: a second
    /// correlation attempt for the same run is ignored.
    pub fn correlate_run(&mut self, run: RunId, actor: ActorId) {
        self.triggered_by.entry(run).or_insert(actor);
    }

    /// The actor on whose behalf directives from this run's completions act.
    /// `None` for runs started directly by an external owner.
    pub fn acting_actor(&self, run: RunId) -> Option<ActorId> {
        self.triggered_by.get(&run).copied()
    }

    pub fn info(&self, actor: ActorId) -> Result<&Actor, ConclaveError> {
        self.actors
            .get(actor.index())
            .ok_or(ConclaveError::UnknownActor(actor))
    }

    pub fn all_info(&self) -> &[Actor] {
        &self.actors
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    fn info_mut(&mut self, actor: ActorId) -> Result<&mut Actor, ConclaveError> {
        self.actors
            .get_mut(actor.index())
            .ok_or(ConclaveError::UnknownActor(actor))
    }
}
