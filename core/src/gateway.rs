//! Outbound Oracle request issuance and inbound callback authentication.
//!
//! The Oracle is asynchronous: the core never blocks on a reply. Requests go
//! out over a channel and the Oracle resumes the run later through the
//! matching callback, so a thread is never parked on the wire.

use conclave_protocol::CallerId;
use conclave_protocol::CompletionConfig;
use conclave_protocol::ConclaveError;
use conclave_protocol::OracleRequest;
use conclave_protocol::RunId;
use tokio::sync::mpsc;

/// Number of documents requested from a knowledge-base query.
pub const KB_TOP_K: u32 = 3;

/// Issues outbound Oracle requests and authenticates inbound callbacks
/// against the single trusted Oracle identity.
pub struct OracleGateway {
    oracle: CallerId,
    outbound: mpsc::UnboundedSender<OracleRequest>,
}

impl OracleGateway {
    /// Creates a gateway trusting `oracle` as the sole callback origin.
    /// Returns the receiving half of the outbound channel; the transport that
    /// talks to the Oracle drains it.
    pub fn new(oracle: CallerId) -> (Self, mpsc::UnboundedReceiver<OracleRequest>) {
        let (outbound, requests) = mpsc::unbounded_channel();
        (Self { oracle, outbound }, requests)
    }

    /// Fails with `Unauthorized` unless `caller` is the trusted Oracle.
    pub fn ensure_oracle(&self, caller: &CallerId) -> Result<(), ConclaveError> {
        if caller != &self.oracle {
            return Err(ConclaveError::Unauthorized);
        }
        Ok(())
    }

    pub fn request_completion(&self, run: RunId, config: CompletionConfig) {
        self.send(OracleRequest::Completion { run, config });
    }

    pub fn request_tool(&self, run: RunId, name: &str, args: &str) {
        self.send(OracleRequest::Tool {
            run,
            name: name.to_string(),
            args: args.to_string(),
        });
    }

    pub fn request_knowledge_base(&self, run: RunId, kb_id: &str, query: &str) {
        self.send(OracleRequest::KnowledgeBase {
            run,
            kb_id: kb_id.to_string(),
            query: query.to_string(),
            top_k: KB_TOP_K,
        });
    }

    fn send(&self, request: OracleRequest) {
        tracing::debug!(run = %request.run(), "issuing oracle request");
        // A closed channel means the transport is gone; the run stays parked
        // in its awaiting state, which is the contract (no watchdog).
        if self.outbound.send(request).is_err() {
            tracing::warn!("oracle transport closed; request dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_the_trusted_oracle_passes_the_capability_check() {
        let (gateway, _requests) = OracleGateway::new(CallerId::new("oracle"));
        assert!(gateway.ensure_oracle(&CallerId::new("oracle")).is_ok());
        assert_eq!(
            gateway.ensure_oracle(&CallerId::new("impostor")).unwrap_err(),
            ConclaveError::Unauthorized
        );
    }

    #[test]
    fn requests_arrive_on_the_outbound_channel() {
        let (gateway, mut requests) = OracleGateway::new(CallerId::new("oracle"));
        gateway.request_knowledge_base(RunId(4), "kb-1", "what is rust");
        match requests.try_recv() {
            Ok(OracleRequest::KnowledgeBase {
                run,
                kb_id,
                query,
                top_k,
            }) => {
                assert_eq!(run, RunId(4));
                assert_eq!(kb_id, "kb-1");
                assert_eq!(query, "what is rust");
                assert_eq!(top_k, KB_TOP_K);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn a_dropped_transport_does_not_panic() {
        let (gateway, requests) = OracleGateway::new(CallerId::new("oracle"));
        drop(requests);
        gateway.request_completion(RunId(0), CompletionConfig::default());
    }
}
