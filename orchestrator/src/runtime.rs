//! Core orchestrator runtime.

use conclave_core::actors::Actor;
use conclave_core::actors::ActorRegistry;
use conclave_core::directive::parse_directives;
use conclave_core::directive::Directive;
use conclave_core::directive::DirectiveBudget;
use conclave_core::gateway::OracleGateway;
use conclave_core::runs::ChatRunStore;
use conclave_core::runs::NextRequest;
use conclave_core::runs::RunState;
use conclave_protocol::ActorId;
use conclave_protocol::CallerId;
use conclave_protocol::CompletionConfig;
use conclave_protocol::CompletionResponse;
use conclave_protocol::ConclaveError;
use conclave_protocol::Message;
use conclave_protocol::OracleRequest;
use conclave_protocol::PendingRequest;
use conclave_protocol::RunId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// The composition layer: run store, actor registry, interpreter, and
/// gateway behind one async API.
///
/// Per-run requests are strictly serialized by the run state machine (at
/// most one outstanding Oracle request, the next issued only after the prior
/// callback is processed); distinct runs interleave freely.
pub struct Orchestrator {
    runs: Arc<RwLock<ChatRunStore>>,
    actors: Arc<RwLock<ActorRegistry>>,
    gateway: OracleGateway,
    completion_config: CompletionConfig,
}

impl Orchestrator {
    /// Creates an orchestrator trusting `oracle` as the sole callback
    /// origin. The returned receiver carries every outbound Oracle request.
    pub fn new(oracle: CallerId) -> (Self, mpsc::UnboundedReceiver<OracleRequest>) {
        Self::with_config(oracle, CompletionConfig::default())
    }

    /// Same, with explicit model parameters attached to every completion
    /// request.
    pub fn with_config(
        oracle: CallerId,
        completion_config: CompletionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<OracleRequest>) {
        let (gateway, requests) = OracleGateway::new(oracle);
        (
            Self {
                runs: Arc::new(RwLock::new(ChatRunStore::new())),
                actors: Arc::new(RwLock::new(ActorRegistry::new())),
                gateway,
                completion_config,
            },
            requests,
        )
    }

    /// Starts a run owned by `owner` from one initial user message and
    /// issues the first completion request.
    pub async fn start_run(&self, owner: CallerId, initial_text: &str) -> RunId {
        self.start_run_inner(owner, initial_text, None).await
    }

    /// Same, with a knowledge base attached: every caller message, the first
    /// included, is routed through retrieval before completion.
    pub async fn start_run_with_knowledge_base(
        &self,
        owner: CallerId,
        initial_text: &str,
        kb_id: &str,
    ) -> RunId {
        self.start_run_inner(owner, initial_text, Some(kb_id.to_string()))
            .await
    }

    async fn start_run_inner(
        &self,
        owner: CallerId,
        initial_text: &str,
        knowledge_base: Option<String>,
    ) -> RunId {
        let run = self
            .runs
            .write()
            .await
            .start_run(owner, initial_text, knowledge_base.clone());
        match knowledge_base {
            Some(kb_id) => self.gateway.request_knowledge_base(run, &kb_id, initial_text),
            None => self
                .gateway
                .request_completion(run, self.completion_config.clone()),
        }
        tracing::info!(run = %run, "started run");
        run
    }

    /// Appends a caller message and issues the next Oracle request for the
    /// run. Fails unless `caller` owns the run and the assistant spoke last.
    pub async fn submit_message(
        &self,
        run: RunId,
        caller: &CallerId,
        text: &str,
    ) -> Result<(), ConclaveError> {
        let next = self.runs.write().await.submit_message(run, caller, text)?;
        match next {
            NextRequest::Completion => self
                .gateway
                .request_completion(run, self.completion_config.clone()),
            NextRequest::KnowledgeBase { kb_id } => {
                self.gateway.request_knowledge_base(run, &kb_id, text);
            }
        }
        Ok(())
    }

    /// Ordered transcript of a run.
    pub async fn history(&self, run: RunId) -> Result<Vec<Message>, ConclaveError> {
        Ok(self.runs.read().await.history(run)?.to_vec())
    }

    /// The run's outstanding Oracle request, if any.
    pub async fn pending_request(
        &self,
        run: RunId,
    ) -> Result<Option<PendingRequest>, ConclaveError> {
        Ok(self.runs.read().await.get(run)?.pending_request.clone())
    }

    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Registers a new actor under the next sequential id.
    pub async fn create_actor(&self, system_prompt: &str, initial_context: &str) -> ActorId {
        self.actors
            .write()
            .await
            .create_actor(system_prompt, initial_context)
    }

    /// Delivers `text` to an actor by spawning a run carrying the actor's
    /// composite prompt. The run is correlated to the target actor, so the
    /// Oracle's replies on it act on that actor's behalf.
    pub async fn message_actor(&self, target: ActorId, text: &str) -> Result<RunId, ConclaveError> {
        let prompt = self.actors.read().await.compose_prompt(target, text)?;
        let run = self
            .runs
            .write()
            .await
            .start_run(CallerId::for_actor(target), &prompt, None);
        {
            let mut actors = self.actors.write().await;
            actors.link_run(target, run)?;
            actors.correlate_run(run, target);
        }
        self.gateway
            .request_completion(run, self.completion_config.clone());
        tracing::info!(run = %run, actor = %target, "spawned actor run");
        Ok(run)
    }

    /// Wholesale context replacement for an actor.
    pub async fn introspect(&self, actor: ActorId, new_context: &str) -> Result<(), ConclaveError> {
        self.actors.write().await.introspect(actor, new_context)
    }

    pub async fn actor_info(&self, actor: ActorId) -> Result<Actor, ConclaveError> {
        Ok(self.actors.read().await.info(actor)?.clone())
    }

    pub async fn all_actor_info(&self) -> Vec<Actor> {
        self.actors.read().await.all_info().to_vec()
    }

    pub async fn actor_count(&self) -> usize {
        self.actors.read().await.len()
    }

    /// Completion callback from the Oracle.
    ///
    /// A non-empty `error` is surfaced verbatim into the transcript as the
    /// assistant's message, never swallowed. A named tool defers the
    /// transcript and calls out. Plain content is interpreted for directives
    /// first, then appended raw — control plane and human-readable text share
    /// one payload.
    pub async fn on_completion(
        &self,
        caller: &CallerId,
        run: RunId,
        response: CompletionResponse,
        error: &str,
    ) -> Result<(), ConclaveError> {
        self.gateway.ensure_oracle(caller)?;
        if !error.is_empty() {
            return self.runs.write().await.complete_with_text(run, error);
        }
        if response.has_tool_call() {
            self.runs.write().await.begin_tool(run, &response.tool_name)?;
            self.gateway
                .request_tool(run, &response.tool_name, &response.tool_args);
            return Ok(());
        }
        // Reject out-of-order callbacks before any directive side effects.
        self.runs
            .read()
            .await
            .ensure_state(run, RunState::AwaitingCompletion)?;
        self.apply_directives(run, &response.content).await;
        self.runs
            .write()
            .await
            .complete_with_text(run, &response.content)
    }

    /// Tool-result callback. The output (or the tool error, surfaced the
    /// same way) becomes a `User` message and a follow-up completion always
    /// goes out.
    pub async fn on_tool_result(
        &self,
        caller: &CallerId,
        run: RunId,
        output: &str,
        error: &str,
    ) -> Result<(), ConclaveError> {
        self.gateway.ensure_oracle(caller)?;
        let text = if error.is_empty() { output } else { error };
        self.runs.write().await.accept_tool_result(run, text)?;
        self.gateway
            .request_completion(run, self.completion_config.clone());
        Ok(())
    }

    /// Knowledge-base callback. Retrieved documents are folded into the
    /// `User` message that triggered the query; the completion goes out
    /// whether or not retrieval produced anything, so the run cannot stall.
    pub async fn on_knowledge_base_result(
        &self,
        caller: &CallerId,
        run: RunId,
        documents: &[String],
        error: &str,
    ) -> Result<(), ConclaveError> {
        self.gateway.ensure_oracle(caller)?;
        let context = if error.is_empty() && !documents.is_empty() {
            Some(format!("\n\nRelevant context:\n{}\n", documents.join("\n")))
        } else {
            None
        };
        self.runs
            .write()
            .await
            .accept_kb_result(run, context.as_deref())?;
        self.gateway
            .request_completion(run, self.completion_config.clone());
        Ok(())
    }

    /// Applies every admitted directive from one completion payload, in
    /// order. A run with no actor correlation gets no side effects at all:
    /// there is no actor to act as, so the control plane fails closed.
    async fn apply_directives(&self, run: RunId, content: &str) {
        let directives = parse_directives(content);
        if directives.is_empty() {
            return;
        }
        let acting = {
            let actors = self.actors.read().await;
            match actors.acting_actor(run) {
                Some(acting) => acting,
                None => {
                    tracing::warn!(run = %run, "dropping directives from uncorrelated run");
                    return;
                }
            }
        };
        let mut budget = match self.actors.read().await.info(acting) {
            Ok(info) => DirectiveBudget::new(info.spawn_limit, info.message_limit),
            Err(err) => {
                tracing::warn!(run = %run, %err, "acting actor vanished");
                return;
            }
        };
        for directive in directives {
            if !budget.admit(&directive) {
                tracing::debug!(run = %run, "directive over budget, dropped");
                continue;
            }
            if let Err(err) = self.apply_directive(run, acting, directive).await {
                tracing::warn!(run = %run, %err, "directive failed");
            }
        }
    }

    async fn apply_directive(
        &self,
        run: RunId,
        acting: ActorId,
        directive: Directive,
    ) -> Result<(), ConclaveError> {
        match directive {
            Directive::Introspect { context } => {
                self.actors.write().await.introspect(acting, &context)
            }
            Directive::Message { target, text } => {
                self.message_actor(target, &text).await?;
                Ok(())
            }
            Directive::Create {
                system_prompt,
                context,
            } => {
                let mut actors = self.actors.write().await;
                let created = actors.create_actor(&system_prompt, &context);
                actors.link_run(created, run)?;
                tracing::info!(run = %run, actor = %created, "directive created actor");
                Ok(())
            }
        }
    }
}
