//! Directive extraction from completion text.
//!
//! The Oracle's reply is one payload carrying both the human-readable text
//! and the control plane: `|COMMAND|<verb>|<args>|` sequences embedded
//! anywhere in it. Parsing is purely lexical — split on `|`, look for the
//! `COMMAND` marker — so the surrounding prose never has to be well formed.

use conclave_protocol::ActorId;

/// Token that opens a directive. A token that merely starts with the marker
/// also opens one, matching the wire grammar.
pub const COMMAND_MARKER: &str = "COMMAND";

/// One parsed command extracted from completion text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Replace the acting actor's context wholesale.
    Introspect { context: String },
    /// Spawn a run delivering `text` to `target`.
    Message { target: ActorId, text: String },
    /// Register a new actor.
    Create {
        system_prompt: String,
        context: String,
    },
}

/// Parses every well-formed directive out of `content`, in order of
/// appearance.
///
/// A malformed directive (missing argument tokens, unknown verb, non-numeric
/// `message` target) is skipped with a warning and does not affect the
/// directives around it.
pub fn parse_directives(content: &str) -> Vec<Directive> {
    let tokens: Vec<&str> = content.split('|').collect();
    let mut directives = Vec::new();
    let mut index = 0;
    while index < tokens.len() {
        if !tokens[index].starts_with(COMMAND_MARKER) {
            index += 1;
            continue;
        }
        match parse_one(&tokens[index + 1..]) {
            Ok((directive, consumed)) => {
                directives.push(directive);
                index += 1 + consumed;
            }
            Err(reason) => {
                tracing::warn!(reason, "skipping malformed directive");
                index += 1;
            }
        }
    }
    directives
}

/// Parses a single directive from the tokens following a `COMMAND` marker,
/// returning it plus the number of tokens consumed.
fn parse_one(rest: &[&str]) -> Result<(Directive, usize), &'static str> {
    let verb = *rest.first().ok_or("missing verb")?;
    match verb {
        "introspect" => {
            let context = *rest.get(1).ok_or("introspect: missing context")?;
            Ok((
                Directive::Introspect {
                    context: context.to_string(),
                },
                2,
            ))
        }
        "message" => {
            let target = *rest.get(1).ok_or("message: missing target")?;
            let text = *rest.get(2).ok_or("message: missing text")?;
            let target: u64 = target
                .trim()
                .parse()
                .map_err(|_| "message: target is not an actor id")?;
            Ok((
                Directive::Message {
                    target: ActorId(target),
                    text: text.to_string(),
                },
                3,
            ))
        }
        "create" => {
            let system_prompt = *rest.get(1).ok_or("create: missing system prompt")?;
            let context = *rest.get(2).ok_or("create: missing context")?;
            Ok((
                Directive::Create {
                    system_prompt: system_prompt.to_string(),
                    context: context.to_string(),
                },
                3,
            ))
        }
        _ => Err("unknown verb"),
    }
}

/// Per-response caps on directive side effects.
///
/// Directives beyond a cap are dropped silently — never queued, never an
/// error. Caps come from the acting actor's limit fields.
#[derive(Debug)]
pub struct DirectiveBudget {
    spawn_limit: u32,
    message_limit: u32,
    creations: u32,
    messages: u32,
}

impl DirectiveBudget {
    pub fn new(spawn_limit: u32, message_limit: u32) -> Self {
        Self {
            spawn_limit,
            message_limit,
            creations: 0,
            messages: 0,
        }
    }

    /// Whether this directive may still be applied; counts it if so.
    pub fn admit(&mut self, directive: &Directive) -> bool {
        match directive {
            Directive::Introspect { .. } => true,
            Directive::Message { .. } => {
                if self.messages < self.message_limit {
                    self.messages += 1;
                    true
                } else {
                    false
                }
            }
            Directive::Create { .. } => {
                if self.creations < self.spawn_limit {
                    self.creations += 1;
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::ACTOR_LIMIT;
    use crate::actors::MESSAGE_LIMIT;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_single_introspect() {
        let directives = parse_directives("|COMMAND|introspect|new ctx|");
        assert_eq!(
            directives,
            [Directive::Introspect {
                context: "new ctx".to_string()
            }]
        );
    }

    #[test]
    fn parses_directives_embedded_in_prose() {
        let directives = parse_directives(
            "I will delegate this. |COMMAND|message|3|please summarize| Then report back.",
        );
        assert_eq!(
            directives,
            [Directive::Message {
                target: ActorId(3),
                text: "please summarize".to_string()
            }]
        );
    }

    #[test]
    fn preserves_order_across_mixed_directives() {
        let directives = parse_directives(
            "|COMMAND|create|sys|ctx|COMMAND|introspect|done delegating|",
        );
        assert_eq!(
            directives,
            [
                Directive::Create {
                    system_prompt: "sys".to_string(),
                    context: "ctx".to_string()
                },
                Directive::Introspect {
                    context: "done delegating".to_string()
                },
            ]
        );
    }

    #[test]
    fn marker_prefix_also_opens_a_directive() {
        let directives = parse_directives("|COMMANDS|introspect|ctx|");
        assert_eq!(
            directives,
            [Directive::Introspect {
                context: "ctx".to_string()
            }]
        );
    }

    #[test]
    fn non_numeric_message_target_is_rejected_not_zeroed() {
        assert!(parse_directives("|COMMAND|message|nope|hi|").is_empty());
    }

    #[test]
    fn malformed_directive_does_not_poison_the_rest() {
        let directives = parse_directives(
            "|COMMAND|message|nope|hi|COMMAND|introspect|fixed|COMMAND|unknownverb|x|",
        );
        assert_eq!(
            directives,
            [Directive::Introspect {
                context: "fixed".to_string()
            }]
        );
    }

    #[test]
    fn truncated_directive_at_end_of_text_is_skipped() {
        assert!(parse_directives("|COMMAND|introspect").is_empty());
        assert!(parse_directives("|COMMAND").is_empty());
        assert!(parse_directives("plain text, no pipes").is_empty());
    }

    #[test]
    fn budget_admits_up_to_the_message_cap() {
        let mut budget = DirectiveBudget::new(ACTOR_LIMIT, MESSAGE_LIMIT);
        let message = Directive::Message {
            target: ActorId(0),
            text: "hi".to_string(),
        };
        let admitted = (0..6).filter(|_| budget.admit(&message)).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn budget_admits_up_to_the_creation_cap() {
        let mut budget = DirectiveBudget::new(ACTOR_LIMIT, MESSAGE_LIMIT);
        let create = Directive::Create {
            system_prompt: "sys".to_string(),
            context: "ctx".to_string(),
        };
        let admitted = (0..3).filter(|_| budget.admit(&create)).count();
        assert_eq!(admitted, 2);
    }

    #[test]
    fn introspect_is_never_budgeted() {
        let mut budget = DirectiveBudget::new(0, 0);
        let introspect = Directive::Introspect {
            context: "ctx".to_string(),
        };
        assert!(budget.admit(&introspect));
        assert!(budget.admit(&introspect));
    }
}
