//! Result interpretation.
//!
//! [`ResultWalker`] visits a [`RawResponse`] round by round, node by node and
//! resource by resource, in the order salt-api returned them. Each resource
//! is classified, reported, and checked for explicit failure:
//!
//! - a mapping with `result: false` (or the string `"false"`) failed
//! - a mapping with `result: null` did nothing and is informational
//! - a mapping with a truthy `result` succeeded
//! - a mapping without `result`, or a list, is shown verbatim
//! - a plain string in place of a resource failed (salt reports render and
//!   compile errors this way)
//!
//! On failure the walker either asks an [`Escalation`], raises
//! [`Error::StateFailure`] immediately, or records the failure and keeps going,
//! depending on [`WalkOptions`]. All working state lives in the call; the
//! response is never modified.

use crate::error::{Error, Result};
use crate::escalate::{
    AutoAbort, DEFAULT_ESCALATION_TIMEOUT, Escalation, EscalationDecision, EscalationRequest,
};
use crate::payload::{RawResponse, ResourcePayload};
use crate::report::{Classification, NodeReport, Notice, ReportEntry, Reporter};
use crate::types::RunOptions;
use std::time::Duration;

/// Options for a single walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Raise on the first failure instead of reporting it.
    pub fail_on_error: bool,
    /// Emit node reports.
    pub print_results: bool,
    /// Hide successful resources without changes.
    pub print_only_changes: bool,
    /// Ask an operator instead of failing.
    pub escalate_on_failure: bool,
    /// How long to wait for the operator.
    pub escalation_timeout: Duration,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            fail_on_error: true,
            print_results: true,
            print_only_changes: false,
            escalate_on_failure: false,
            escalation_timeout: DEFAULT_ESCALATION_TIMEOUT,
        }
    }
}

impl WalkOptions {
    /// Enable or disable operator escalation.
    pub fn escalate(mut self, enabled: bool, timeout: Duration) -> Self {
        self.escalate_on_failure = enabled;
        self.escalation_timeout = timeout;
        self
    }
}

impl From<&RunOptions> for WalkOptions {
    fn from(options: &RunOptions) -> Self {
        Self {
            fail_on_error: options.fail_on_error,
            print_results: options.print_results,
            print_only_changes: options.print_only_changes,
            ..Self::default()
        }
    }
}

/// A failure that did not abort the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Node id.
    pub node: String,
    /// Resource id.
    pub resource: String,
}

/// What a completed walk saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Resources classified as success (shown).
    pub succeeded: usize,
    /// Successful resources hidden for lack of changes.
    pub unchanged: usize,
    /// Resources classified as failure.
    pub failed: usize,
    /// Informational (`result: null`) resources.
    pub info: usize,
    /// Raw resources and scalar node outputs.
    pub raw: usize,
    /// Failures that were reported instead of raised.
    pub failures: Vec<FailureRecord>,
    /// Indices of empty rounds that were reported instead of raised.
    pub empty_rounds: Vec<usize>,
}

impl WalkSummary {
    /// Whether no failure or empty round was recorded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.empty_rounds.is_empty()
    }

    /// Total number of classified resources.
    pub fn total(&self) -> usize {
        self.succeeded + self.unchanged + self.failed + self.info + self.raw
    }

    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Success => self.succeeded += 1,
            Classification::SuccessNoChange => self.unchanged += 1,
            Classification::Failure => self.failed += 1,
            Classification::Info => self.info += 1,
            Classification::Raw => self.raw += 1,
        }
    }
}

/// Whether a `result` value is an explicit failure.
fn is_explicit_false(result: &ResourcePayload) -> bool {
    match result {
        ResourcePayload::Bool(b) => !b,
        ResourcePayload::Text(s) => s == "false",
        _ => false,
    }
}

/// Classify one resource (bookkeeping keys already stripped).
pub fn classify(resource: &ResourcePayload, print_only_changes: bool) -> Classification {
    match resource {
        ResourcePayload::Fields(_) => {
            let Some(result) = resource.get("result") else {
                return Classification::Raw;
            };

            let not_true_string =
                matches!(result, ResourcePayload::Text(s) if s != "true");

            if !result.is_truthy() || not_true_string {
                if *result == ResourcePayload::Null {
                    Classification::Info
                } else {
                    Classification::Failure
                }
            } else if print_only_changes
                && !resource
                    .get("changes")
                    .is_some_and(ResourcePayload::is_truthy)
            {
                Classification::SuccessNoChange
            } else {
                Classification::Success
            }
        }
        ResourcePayload::Sequence(_) => Classification::Raw,
        ResourcePayload::Text(_) => Classification::Failure,
        _ => Classification::Raw,
    }
}

/// Whether a resource must be treated as a failure.
///
/// Only a plain string or an explicit `result: false` qualify; a missing
/// `result` never does, whatever the rest of the resource contains.
pub fn is_failure_trigger(resource: &ResourcePayload) -> bool {
    match resource {
        ResourcePayload::Text(_) => true,
        ResourcePayload::Fields(_) => resource.get("result").is_some_and(is_explicit_false),
        _ => false,
    }
}

/// Walks responses applying the failure policy.
pub struct ResultWalker<'a> {
    options: WalkOptions,
    reporter: &'a dyn Reporter,
    escalation: &'a dyn Escalation,
}

impl<'a> ResultWalker<'a> {
    /// Create a walker that reports to `reporter` and never escalates to a human.
    pub fn new(options: WalkOptions, reporter: &'a dyn Reporter) -> Self {
        Self {
            options,
            reporter,
            escalation: &AutoAbort,
        }
    }

    /// Use `escalation` when `escalate_on_failure` is set.
    pub fn with_escalation(mut self, escalation: &'a dyn Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    /// Walk a response.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyResponse`] for an empty `return` list or an empty round,
    ///   when `fail_on_error` is set
    /// - [`Error::StateFailure`] for the first failed resource, when
    ///   `fail_on_error` is set and escalation is off
    /// - [`Error::EscalationAborted`] / [`Error::EscalationTimedOut`] when an
    ///   escalation did not answer Continue
    pub fn walk(&self, response: &RawResponse) -> Result<WalkSummary> {
        let mut summary = WalkSummary::default();

        if response.rounds.is_empty() {
            self.empty_round(0, &mut summary)?;
        }

        for (index, round) in response.rounds.iter().enumerate() {
            if !round.is_truthy() {
                self.empty_round(index, &mut summary)?;
                continue;
            }

            if round.is_container() {
                for (node, payload) in round.entries() {
                    self.walk_node(&node, payload, &mut summary)?;
                }
            } else {
                self.walk_node(&index.to_string(), round, &mut summary)?;
            }
        }

        log::debug!(
            "walked {} resources: {} ok, {} unchanged, {} failed, {} info, {} raw",
            summary.total(),
            summary.succeeded,
            summary.unchanged,
            summary.failed,
            summary.info,
            summary.raw
        );

        Ok(summary)
    }

    fn walk_node(
        &self,
        node: &str,
        payload: &ResourcePayload,
        summary: &mut WalkSummary,
    ) -> Result<()> {
        log::trace!("walking node {node}");
        let mut report = NodeReport::new(node);

        if payload.is_container() {
            for (resource_id, resource) in payload.entries() {
                let resource = resource.without_bookkeeping();
                let classification = classify(&resource, self.options.print_only_changes);
                summary.record(classification);

                let entry = ReportEntry {
                    resource: resource_id,
                    classification,
                    body: resource.render(),
                };

                if is_failure_trigger(&resource) {
                    self.on_failure(node, &entry, summary)?;
                }

                if classification.is_shown() {
                    report.entries.push(entry);
                }
            }
        } else if payload.is_truthy() {
            summary.record(Classification::Raw);
            report.entries.push(ReportEntry {
                resource: node.to_string(),
                classification: Classification::Raw,
                body: payload.render(),
            });
        }

        if self.options.print_results && !report.is_empty() {
            self.reporter.emit(&report);
        }

        Ok(())
    }

    fn on_failure(
        &self,
        node: &str,
        entry: &ReportEntry,
        summary: &mut WalkSummary,
    ) -> Result<()> {
        let record = FailureRecord {
            node: node.to_string(),
            resource: entry.resource.clone(),
        };

        if self.options.escalate_on_failure {
            self.reporter.notice(&Notice::Failure {
                node: node.to_string(),
                entry: entry.clone(),
                continuing: false,
            });

            let request = EscalationRequest {
                node,
                resource: &entry.resource,
                output: &entry.body,
                timeout: self.options.escalation_timeout,
            };

            return match self.escalation.escalate(&request) {
                EscalationDecision::Continue => {
                    log::warn!(
                        "operator chose to continue after {} failed on {node}",
                        entry.resource
                    );
                    summary.failures.push(record);
                    Ok(())
                }
                EscalationDecision::Abort => Err(Error::EscalationAborted {
                    node: record.node,
                    resource: record.resource,
                }),
                EscalationDecision::TimedOut => Err(Error::EscalationTimedOut {
                    node: record.node,
                    resource: record.resource,
                    timeout: self.options.escalation_timeout,
                }),
            };
        }

        self.reporter.notice(&Notice::Failure {
            node: node.to_string(),
            entry: entry.clone(),
            continuing: !self.options.fail_on_error,
        });

        if self.options.fail_on_error {
            return Err(Error::StateFailure {
                node: record.node,
                resource: record.resource,
                output: entry.body.clone(),
            });
        }

        log::warn!("{} failed on {node}, continuing", entry.resource);
        summary.failures.push(record);
        Ok(())
    }

    fn empty_round(&self, round: usize, summary: &mut WalkSummary) -> Result<()> {
        self.reporter.notice(&Notice::EmptyRound { round });

        if self.options.fail_on_error {
            return Err(Error::EmptyResponse { round });
        }

        log::warn!("salt-api returned no data for round {round}, continuing");
        summary.empty_rounds.push(round);
        Ok(())
    }
}

/// Check that every node's output contains `sentinel`.
///
/// Used for shell commands, whose results are plain strings without a
/// `result` field. Empty rounds are left to the walker.
///
/// # Errors
///
/// Returns [`Error::CommandExecutionFailure`] naming the first node whose
/// output lacks the sentinel.
pub fn verify_sentinel(response: &RawResponse, sentinel: &str, command: &str) -> Result<()> {
    for (index, round) in response.rounds.iter().enumerate() {
        if !round.is_truthy() {
            continue;
        }

        let nodes = if round.is_container() {
            round.entries()
        } else {
            vec![(index.to_string(), round)]
        };

        for (node, output) in nodes {
            let found = output.as_text().is_some_and(|text| text.contains(sentinel));
            if !found {
                return Err(Error::CommandExecutionFailure {
                    node,
                    command: command.to_string(),
                    output: output.render(),
                });
            }
            log::debug!("command succeeded on {node}");
        }
    }
    Ok(())
}
