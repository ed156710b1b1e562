//! Append-only chat run transcripts and the per-run state machine.
//!
//! A run is one conversation thread: an ordered transcript whose roles
//! alternate starting with `User`, plus the single-outstanding-request
//! discipline toward the Oracle. Runs are created, then mutated only by
//! owner-submitted messages and Oracle callbacks; they are never deleted.

use conclave_protocol::CallerId;
use conclave_protocol::ConclaveError;
use conclave_protocol::Message;
use conclave_protocol::PendingRequest;
use conclave_protocol::Role;
use conclave_protocol::RunId;

/// Where a run sits in its request/response cycle.
///
/// There is no terminal state: a run idles at `AwaitingCallerInput`
/// indefinitely absent further input, and a run whose callback never arrives
/// stays parked in its awaiting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AwaitingCompletion,
    AwaitingTool,
    AwaitingKbResult,
    AwaitingCallerInput,
}

/// What the orchestrator owes the Oracle after a caller message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextRequest {
    Completion,
    KnowledgeBase { kb_id: String },
}

/// One conversation thread.
#[derive(Debug)]
pub struct ChatRun {
    pub id: RunId,
    pub owner: CallerId,
    messages: Vec<Message>,
    pub pending_request: Option<PendingRequest>,
    pub state: RunState,
    /// Knowledge base consulted before each completion, if one is attached.
    pub knowledge_base: Option<String>,
}

impl ChatRun {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|message| message.role)
    }
}

/// Arena of all chat runs. Ids are dense indexes into the table and stay
/// valid for the life of the process; the table only grows.
#[derive(Debug, Default)]
pub struct ChatRunStore {
    runs: Vec<ChatRun>,
}

impl ChatRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a run with a single `User` message, already awaiting its first
    /// Oracle result. Always succeeds.
    pub fn start_run(
        &mut self,
        owner: CallerId,
        initial_text: &str,
        knowledge_base: Option<String>,
    ) -> RunId {
        let id = RunId(self.runs.len() as u64);
        let (state, pending) = if knowledge_base.is_some() {
            (RunState::AwaitingKbResult, PendingRequest::KnowledgeBase)
        } else {
            (RunState::AwaitingCompletion, PendingRequest::Completion)
        };
        self.runs.push(ChatRun {
            id,
            owner,
            messages: vec![Message::user(initial_text)],
            pending_request: Some(pending),
            state,
            knowledge_base,
        });
        id
    }

    /// Appends a caller-authored `User` message and moves the run back into
    /// an awaiting state. Fails unless the caller owns the run and the last
    /// message was assistant-authored.
    pub fn submit_message(
        &mut self,
        id: RunId,
        caller: &CallerId,
        text: &str,
    ) -> Result<NextRequest, ConclaveError> {
        let run = self.get_mut(id)?;
        if &run.owner != caller {
            return Err(ConclaveError::Unauthorized);
        }
        if run.last_role() != Some(Role::Assistant) {
            return Err(ConclaveError::ProtocolState {
                run: id,
                detail: "no assistant response to reply to".to_string(),
            });
        }
        run.messages.push(Message::user(text));
        match run.knowledge_base.clone() {
            Some(kb_id) => {
                run.pending_request = Some(PendingRequest::KnowledgeBase);
                run.state = RunState::AwaitingKbResult;
                Ok(NextRequest::KnowledgeBase { kb_id })
            }
            None => {
                run.pending_request = Some(PendingRequest::Completion);
                run.state = RunState::AwaitingCompletion;
                Ok(NextRequest::Completion)
            }
        }
    }

    /// Ordered, read-only transcript.
    pub fn history(&self, id: RunId) -> Result<&[Message], ConclaveError> {
        Ok(self.get(id)?.messages())
    }

    /// Completion arrived with no tool call: the assistant text (or the
    /// Oracle-reported error, surfaced verbatim) lands in the transcript and
    /// the run waits for the caller again.
    pub fn complete_with_text(&mut self, id: RunId, text: &str) -> Result<(), ConclaveError> {
        let run = self.expect_state_mut(id, RunState::AwaitingCompletion)?;
        run.messages.push(Message::assistant(text));
        run.pending_request = None;
        run.state = RunState::AwaitingCallerInput;
        Ok(())
    }

    /// Completion named a tool: nothing is appended yet, the run now waits
    /// for the tool result.
    pub fn begin_tool(&mut self, id: RunId, tool: &str) -> Result<(), ConclaveError> {
        let run = self.expect_state_mut(id, RunState::AwaitingCompletion)?;
        run.pending_request = Some(PendingRequest::Tool(tool.to_string()));
        run.state = RunState::AwaitingTool;
        Ok(())
    }

    /// Tool output arrived: the outstanding request is cleared, the output
    /// becomes a `User` message, and a follow-up completion is owed.
    pub fn accept_tool_result(&mut self, id: RunId, output: &str) -> Result<(), ConclaveError> {
        let run = self.expect_state_mut(id, RunState::AwaitingTool)?;
        run.pending_request = None;
        run.messages.push(Message::user(output));
        run.pending_request = Some(PendingRequest::Completion);
        run.state = RunState::AwaitingCompletion;
        Ok(())
    }

    /// Knowledge-base result arrived: the retrieved context (if any) is
    /// folded into the most recent `User` message, not appended as its own
    /// message, and a completion is owed.
    pub fn accept_kb_result(&mut self, id: RunId, context: Option<&str>) -> Result<(), ConclaveError> {
        let run = self.expect_state_mut(id, RunState::AwaitingKbResult)?;
        if let Some(context) = context
            && let Some(last_user) = run
                .messages
                .iter_mut()
                .rev()
                .find(|message| message.role == Role::User)
        {
            last_user.text.push_str(context);
        }
        run.pending_request = Some(PendingRequest::Completion);
        run.state = RunState::AwaitingCompletion;
        Ok(())
    }

    /// Read-only state check used before applying callback side effects.
    pub fn ensure_state(&self, id: RunId, expected: RunState) -> Result<(), ConclaveError> {
        let run = self.get(id)?;
        if run.state != expected {
            return Err(ConclaveError::ProtocolState {
                run: id,
                detail: format!("expected {expected:?}, run is {:?}", run.state),
            });
        }
        Ok(())
    }

    pub fn get(&self, id: RunId) -> Result<&ChatRun, ConclaveError> {
        self.runs.get(id.index()).ok_or(ConclaveError::UnknownRun(id))
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn get_mut(&mut self, id: RunId) -> Result<&mut ChatRun, ConclaveError> {
        self.runs
            .get_mut(id.index())
            .ok_or(ConclaveError::UnknownRun(id))
    }

    fn expect_state_mut(
        &mut self,
        id: RunId,
        expected: RunState,
    ) -> Result<&mut ChatRun, ConclaveError> {
        let run = self.get_mut(id)?;
        if run.state != expected {
            return Err(ConclaveError::ProtocolState {
                run: id,
                detail: format!("expected {expected:?}, run is {:?}", run.state),
            });
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owner() -> CallerId {
        CallerId::new("caller-1")
    }

    #[test]
    fn start_run_awaits_its_first_completion() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "hello", None);
        assert_eq!(run, RunId(0));
        let record = store.get(run).unwrap();
        assert_eq!(record.state, RunState::AwaitingCompletion);
        assert_eq!(record.pending_request, Some(PendingRequest::Completion));
        assert_eq!(record.messages(), [Message::user("hello")]);
    }

    #[test]
    fn kb_backed_run_awaits_retrieval_first() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "hello", Some("kb-1".to_string()));
        let record = store.get(run).unwrap();
        assert_eq!(record.state, RunState::AwaitingKbResult);
        assert_eq!(record.pending_request, Some(PendingRequest::KnowledgeBase));
    }

    #[test]
    fn run_ids_are_dense_and_monotonic() {
        let mut store = ChatRunStore::new();
        assert_eq!(store.start_run(owner(), "a", None), RunId(0));
        assert_eq!(store.start_run(owner(), "b", None), RunId(1));
        assert_eq!(store.start_run(owner(), "c", None), RunId(2));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn submit_rejects_non_owner() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "hello", None);
        store.complete_with_text(run, "hi there").unwrap();
        let err = store
            .submit_message(run, &CallerId::new("intruder"), "psst")
            .unwrap_err();
        assert_eq!(err, ConclaveError::Unauthorized);
    }

    #[test]
    fn submit_rejects_out_of_turn_message() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "hello", None);
        // No assistant reply yet.
        let err = store.submit_message(run, &owner(), "again").unwrap_err();
        assert!(matches!(err, ConclaveError::ProtocolState { .. }));
    }

    #[test]
    fn roles_alternate_over_a_full_exchange() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "q1", None);
        store.complete_with_text(run, "a1").unwrap();
        store.submit_message(run, &owner(), "q2").unwrap();
        store.complete_with_text(run, "a2").unwrap();

        let roles: Vec<Role> = store
            .history(run)
            .unwrap()
            .iter()
            .map(|message| message.role)
            .collect();
        assert_eq!(roles, [Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[test]
    fn tool_flow_appends_output_and_owes_a_completion() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "compute", None);
        store.begin_tool(run, "calculator").unwrap();
        {
            let record = store.get(run).unwrap();
            assert_eq!(record.state, RunState::AwaitingTool);
            assert_eq!(
                record.pending_request,
                Some(PendingRequest::Tool("calculator".to_string()))
            );
            // No transcript entry for the tool call itself.
            assert_eq!(record.messages().len(), 1);
        }
        store.accept_tool_result(run, "42").unwrap();
        let record = store.get(run).unwrap();
        assert_eq!(record.state, RunState::AwaitingCompletion);
        assert_eq!(record.pending_request, Some(PendingRequest::Completion));
        assert_eq!(record.messages().last(), Some(&Message::user("42")));
    }

    #[test]
    fn kb_result_mutates_the_latest_user_message() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "what is rust", Some("kb-1".to_string()));
        store
            .accept_kb_result(run, Some("\n\nRelevant context:\ndoc1\ndoc2\n"))
            .unwrap();
        let record = store.get(run).unwrap();
        assert_eq!(record.messages().len(), 1);
        assert_eq!(
            record.messages()[0].text,
            "what is rust\n\nRelevant context:\ndoc1\ndoc2\n"
        );
        assert_eq!(record.state, RunState::AwaitingCompletion);
    }

    #[test]
    fn callbacks_are_rejected_in_the_wrong_state() {
        let mut store = ChatRunStore::new();
        let run = store.start_run(owner(), "hello", None);
        assert!(store.accept_tool_result(run, "x").is_err());
        assert!(store.accept_kb_result(run, None).is_err());
        store.complete_with_text(run, "done").unwrap();
        assert!(store.complete_with_text(run, "again").is_err());
    }

    #[test]
    fn unknown_run_is_an_explicit_error() {
        let store = ChatRunStore::new();
        assert_eq!(
            store.history(RunId(7)).unwrap_err(),
            ConclaveError::UnknownRun(RunId(7))
        );
    }
}
