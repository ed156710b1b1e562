//! Stable identifiers for runs, actors, and callers.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Identifier of a chat run. Dense, monotonically assigned, never reused;
/// doubles as the index into the run table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an actor. Dense, sequential, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl ActorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque caller identity used for boundary capability checks (run-owner and
/// trusted-Oracle checks). The core never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesized identity that owns runs spawned on behalf of an actor.
    pub fn for_actor(actor: ActorId) -> Self {
        Self(format!("actor:{actor}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn actor_caller_identities_are_distinct() {
        assert_eq!(CallerId::for_actor(ActorId(3)).as_str(), "actor:3");
        assert_ne!(CallerId::for_actor(ActorId(3)), CallerId::for_actor(ActorId(4)));
    }
}
