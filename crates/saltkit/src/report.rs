//! Result reporting.
//!
//! The walker classifies each resource and hands finished [`NodeReport`]s to a
//! [`Reporter`]. Rendering is colour coded by [`Classification`]:
//!
//! | Classification | Colour |
//! |----------------|--------|
//! | Failure        | red    |
//! | Info           | yellow |
//! | Success        | green  |
//! | Raw            | cyan   |
//!
//! A node's block is rendered to one string and written in one call so output
//! from concurrent operations cannot interleave inside it.

use colored::Colorize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Outcome of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Succeeded (shown).
    Success,
    /// Succeeded without changes while only changes are printed (hidden).
    SuccessNoChange,
    /// Explicitly failed.
    Failure,
    /// `result` was null: nothing to do, informational only.
    Info,
    /// No `result` field; shown verbatim.
    Raw,
}

impl Classification {
    /// Whether resources of this class appear in printed output.
    pub fn is_shown(&self) -> bool {
        !matches!(self, Classification::SuccessNoChange)
    }

    /// Colour a line according to this classification.
    fn paint(&self, line: &str) -> String {
        match self {
            Classification::Failure => line.red().to_string(),
            Classification::Info => line.yellow().to_string(),
            Classification::Success | Classification::SuccessNoChange => {
                line.green().to_string()
            }
            Classification::Raw => line.cyan().to_string(),
        }
    }
}

/// One classified resource of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Resource id (state id, list index, or the node id for scalar output).
    pub resource: String,
    /// Outcome.
    pub classification: Classification,
    /// Rendered resource content, bookkeeping keys removed.
    pub body: String,
}

impl ReportEntry {
    /// Render this entry, coloured by classification.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(
            self.classification
                .paint(&format!("Resource: {}", self.resource)),
        );
        for line in self.body.lines() {
            lines.push(self.classification.paint(line));
        }
        lines.join("\n")
    }
}

/// Everything shown for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    /// Node id.
    pub node: String,
    /// Shown entries, in service order.
    pub entries: Vec<ReportEntry>,
}

impl NodeReport {
    /// Create an empty report for `node`.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            entries: Vec::new(),
        }
    }

    /// Whether nothing is to be shown for this node.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the whole node block.
    pub fn render(&self) -> String {
        let mut block = format!("Node changes: {}", self.node).bold().to_string();
        for entry in &self.entries {
            block.push('\n');
            block.push_str(&entry.render());
        }
        block
    }
}

/// Out-of-band events the walker reports regardless of `print_results`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A resource failed.
    Failure {
        /// Node id.
        node: String,
        /// The failed resource.
        entry: ReportEntry,
        /// Whether the walk continues past this failure.
        continuing: bool,
    },
    /// A round of the response carried no data.
    EmptyRound {
        /// Index of the round.
        round: usize,
    },
}

impl Notice {
    /// Render the notice.
    pub fn render(&self) -> String {
        match self {
            Notice::Failure {
                node,
                entry,
                continuing,
            } => {
                let suffix = if *continuing { ", continuing" } else { "" };
                format!(
                    "{}\n{}",
                    format!("✗ Failure on {node}{suffix}").red().bold(),
                    entry.render()
                )
            }
            Notice::EmptyRound { round } => {
                format!("⚠ Empty response from salt-api (round {round})")
                    .yellow()
                    .bold()
                    .to_string()
            }
        }
    }
}

/// Sink for walk output.
pub trait Reporter: Send + Sync {
    /// Emit one node's report as a single block.
    fn emit(&self, report: &NodeReport);

    /// Emit a failure or empty-round notice.
    fn notice(&self, notice: &Notice);
}

/// Reporter that writes to the terminal.
///
/// Node reports go to stdout, notices to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn emit(&self, report: &NodeReport) {
        let block = report.render();
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{block}");
    }

    fn notice(&self, notice: &Notice) {
        let text = notice.render();
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{text}");
    }
}

/// Reporter that keeps rendered output in memory.
///
/// Cloning shares the underlying buffer, so a clone handed to a client can be
/// inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    reports: Arc<Mutex<Vec<NodeReport>>>,
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl MemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Node reports emitted so far.
    pub fn reports(&self) -> Vec<NodeReport> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Notices emitted so far.
    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// All emitted node blocks, rendered and joined by newlines.
    pub fn output(&self) -> String {
        self.reports()
            .iter()
            .map(NodeReport::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Forget everything emitted so far.
    pub fn clear(&self) {
        match self.reports.lock() {
            Ok(mut reports) => reports.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        match self.notices.lock() {
            Ok(mut notices) => notices.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl Reporter for MemoryReporter {
    fn emit(&self, report: &NodeReport) {
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report.clone()),
            Err(poisoned) => poisoned.into_inner().push(report.clone()),
        }
    }

    fn notice(&self, notice: &Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice.clone()),
            Err(poisoned) => poisoned.into_inner().push(notice.clone()),
        }
    }
}
