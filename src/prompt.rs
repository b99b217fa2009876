//! Interactive escalation.
//!
//! The confirmation runs on a helper thread so the wait can be bounded. If
//! nobody answers in time the helper is left blocked on the terminal and the
//! operation stops.

use dialoguer::Confirm;
use saltkit::{Escalation, EscalationDecision, EscalationRequest};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use crate::ui;

/// Asks on the controlling terminal whether to continue after a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl Escalation for TerminalPrompt {
    fn escalate(&self, request: &EscalationRequest<'_>) -> EscalationDecision {
        ui::warn(&format!(
            "{} failed on {}; waiting up to {}s for a decision",
            request.resource,
            request.node,
            request.timeout.as_secs()
        ));

        let prompt = format!("Continue after {} failed on {}?", request.resource, request.node);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let answer = Confirm::new().with_prompt(prompt).default(false).interact();
            let _ = tx.send(answer);
        });

        decide(rx.recv_timeout(request.timeout))
    }
}

/// Map what came back from the prompt thread to a decision.
fn decide(
    received: Result<Result<bool, dialoguer::Error>, RecvTimeoutError>,
) -> EscalationDecision {
    match received {
        Ok(Ok(true)) => EscalationDecision::Continue,
        Ok(Ok(false)) => EscalationDecision::Abort,
        Ok(Err(err)) => {
            log::warn!("Could not read answer: {err}");
            EscalationDecision::Abort
        }
        Err(RecvTimeoutError::Timeout) => EscalationDecision::TimedOut,
        Err(RecvTimeoutError::Disconnected) => EscalationDecision::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_decide() {
        assert_eq!(decide(Ok(Ok(true))), EscalationDecision::Continue);
        assert_eq!(decide(Ok(Ok(false))), EscalationDecision::Abort);
        assert_eq!(
            decide(Err(RecvTimeoutError::Timeout)),
            EscalationDecision::TimedOut
        );
        assert_eq!(
            decide(Err(RecvTimeoutError::Disconnected)),
            EscalationDecision::Abort
        );
    }

    #[test]
    fn test_decide_unreadable_terminal_aborts() {
        let err = dialoguer::Error::IO(io::Error::other("not a terminal"));
        assert_eq!(decide(Ok(Err(err))), EscalationDecision::Abort);
    }
}
