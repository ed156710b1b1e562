//! Oracle request/response surface and its interop sentinels.
//!
//! The Oracle is an external asynchronous provider: this core only issues
//! requests and accepts run-id-correlated callbacks. The sentinel encoding in
//! [`CompletionConfig`] is part of the wire contract and is reproduced
//! exactly.

use crate::ids::RunId;
use serde::Deserialize;
use serde::Serialize;

/// Penalty fields above this raw value mean "unset".
pub const PENALTY_DISABLED_OVER: u32 = 20;
/// Top-p is carried as a percent; values above this mean "unset".
pub const TOP_P_DISABLED_OVER: u32 = 100;
/// Temperature is carried scaled by ten (a raw 10 is 1.0).
pub const TEMPERATURE_SCALE: u32 = 10;
/// A zero seed means "unset".
pub const SEED_UNSET: u64 = 0;

/// Model parameters attached to every completion request.
///
/// Fields use in-band "disabled" sentinels rather than options so the encoded
/// form matches the Oracle bit for bit: penalties above 20 are off, top-p
/// above 100 is off, a zero seed is unset, and empty strings are unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Model name; empty means the Oracle's default.
    pub model: String,
    pub frequency_penalty: u32,
    pub presence_penalty: u32,
    /// Scaled by [`TEMPERATURE_SCALE`].
    pub temperature: u32,
    pub top_p: u32,
    pub seed: u64,
    /// Zero means no explicit cap.
    pub max_tokens: u32,
    /// Stop sequence; empty means none.
    pub stop: String,
    /// End-user tag forwarded to the provider; empty means none.
    pub user: String,
}

impl Default for CompletionConfig {
    /// Everything disabled: the Oracle applies its own defaults.
    fn default() -> Self {
        Self {
            model: String::new(),
            frequency_penalty: PENALTY_DISABLED_OVER + 1,
            presence_penalty: PENALTY_DISABLED_OVER + 1,
            temperature: TEMPERATURE_SCALE,
            top_p: TOP_P_DISABLED_OVER + 1,
            seed: SEED_UNSET,
            max_tokens: 0,
            stop: String::new(),
            user: String::new(),
        }
    }
}

impl CompletionConfig {
    pub fn frequency_penalty_enabled(&self) -> bool {
        self.frequency_penalty <= PENALTY_DISABLED_OVER
    }

    pub fn presence_penalty_enabled(&self) -> bool {
        self.presence_penalty <= PENALTY_DISABLED_OVER
    }

    pub fn top_p_enabled(&self) -> bool {
        self.top_p <= TOP_P_DISABLED_OVER
    }

    /// Temperature as the provider understands it.
    pub fn temperature_value(&self) -> f64 {
        f64::from(self.temperature) / f64::from(TEMPERATURE_SCALE)
    }
}

/// Kind of the single outstanding Oracle request a run may have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingRequest {
    Completion,
    Tool(String),
    KnowledgeBase,
}

/// Outbound request issued to the Oracle, correlated by run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OracleRequest {
    Completion {
        run: RunId,
        config: CompletionConfig,
    },
    Tool {
        run: RunId,
        name: String,
        args: String,
    },
    KnowledgeBase {
        run: RunId,
        kb_id: String,
        query: String,
        top_k: u32,
    },
}

impl OracleRequest {
    /// The run this request resumes when its callback arrives.
    pub fn run(&self) -> RunId {
        match self {
            OracleRequest::Completion { run, .. }
            | OracleRequest::Tool { run, .. }
            | OracleRequest::KnowledgeBase { run, .. } => *run,
        }
    }
}

/// Completion payload delivered by the Oracle.
///
/// `tool_name` uses the empty string as "no tool call", matching the wire
/// contract; the usage counters are informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_name: String,
    pub tool_args: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl CompletionResponse {
    /// A plain text completion with no tool call.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A completion that defers to a tool instead of answering.
    pub fn tool_call(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            tool_name: name.into(),
            tool_args: args.into(),
            ..Self::default()
        }
    }

    pub fn has_tool_call(&self) -> bool {
        !self.tool_name.is_empty()
    }
}
