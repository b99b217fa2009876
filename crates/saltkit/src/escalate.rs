//! Human escalation on failure.
//!
//! When escalation is enabled the walker does not fail on its own: it asks an
//! [`Escalation`] implementation what to do and waits for the answer up to a
//! timeout. The terminal prompt lives in the CLI; this module holds the seam
//! and the non-interactive implementations.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default time to wait for an operator, one hour.
pub const DEFAULT_ESCALATION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// The failure an operator is asked about.
#[derive(Debug, Clone, Copy)]
pub struct EscalationRequest<'a> {
    /// Node id.
    pub node: &'a str,
    /// Resource id.
    pub resource: &'a str,
    /// Rendered resource content.
    pub output: &'a str,
    /// How long to wait for an answer.
    pub timeout: Duration,
}

/// What the operator decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationDecision {
    /// Record the failure and keep walking.
    Continue,
    /// Stop the operation.
    Abort,
    /// No answer before the timeout.
    TimedOut,
}

/// Asks someone whether to continue after a failure.
pub trait Escalation: Send + Sync {
    /// Block until a decision is made or `request.timeout` elapses.
    fn escalate(&self, request: &EscalationRequest<'_>) -> EscalationDecision;
}

/// Escalation that never asks and always aborts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAbort;

impl Escalation for AutoAbort {
    fn escalate(&self, request: &EscalationRequest<'_>) -> EscalationDecision {
        log::debug!(
            "no operator available for {} on {}, aborting",
            request.resource,
            request.node
        );
        EscalationDecision::Abort
    }
}

/// Escalation that replays a fixed list of decisions.
///
/// Once the list is exhausted every further request times out. Cloning
/// shares the queue and the log of requests seen.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEscalation {
    decisions: Arc<Mutex<Vec<EscalationDecision>>>,
    asked: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedEscalation {
    /// Create an escalation answering with `decisions` in order.
    pub fn new(decisions: impl IntoIterator<Item = EscalationDecision>) -> Self {
        let mut decisions: Vec<_> = decisions.into_iter().collect();
        decisions.reverse();
        Self {
            decisions: Arc::new(Mutex::new(decisions)),
            asked: Arc::default(),
        }
    }

    /// `(node, resource)` pairs asked about so far.
    pub fn asked(&self) -> Vec<(String, String)> {
        match self.asked.lock() {
            Ok(asked) => asked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Escalation for ScriptedEscalation {
    fn escalate(&self, request: &EscalationRequest<'_>) -> EscalationDecision {
        let entry = (request.node.to_string(), request.resource.to_string());
        match self.asked.lock() {
            Ok(mut asked) => asked.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        let next = match self.decisions.lock() {
            Ok(mut decisions) => decisions.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        next.unwrap_or(EscalationDecision::TimedOut)
    }
}
