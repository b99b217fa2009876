//! Core types for salt-api commands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How salt-api matches a target expression against minion ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Shell-style glob on the minion id.
    Glob,
    /// Perl-compatible regular expression on the minion id.
    Pcre,
    /// Comma separated list of minion ids.
    List,
    /// Grain value match.
    Grain,
    /// Grain regular expression match.
    GrainPcre,
    /// Pillar value match.
    Pillar,
    /// Pillar regular expression match.
    PillarPcre,
    /// Nodegroup defined on the master.
    Nodegroup,
    /// Range cluster expression.
    Range,
    /// Compound matcher (the default for pipelines).
    #[default]
    Compound,
    /// Subnet match.
    Ipcidr,
}

impl MatchType {
    /// Get the `expr_form` value sent to salt-api.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Glob => "glob",
            MatchType::Pcre => "pcre",
            MatchType::List => "list",
            MatchType::Grain => "grain",
            MatchType::GrainPcre => "grain_pcre",
            MatchType::Pillar => "pillar",
            MatchType::PillarPcre => "pillar_pcre",
            MatchType::Nodegroup => "nodegroup",
            MatchType::Range => "range",
            MatchType::Compound => "compound",
            MatchType::Ipcidr => "ipcidr",
        }
    }

    /// Parse a match type from its `expr_form` name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "glob" => Some(MatchType::Glob),
            "pcre" => Some(MatchType::Pcre),
            "list" => Some(MatchType::List),
            "grain" => Some(MatchType::Grain),
            "grain_pcre" => Some(MatchType::GrainPcre),
            "pillar" => Some(MatchType::Pillar),
            "pillar_pcre" => Some(MatchType::PillarPcre),
            "nodegroup" => Some(MatchType::Nodegroup),
            "range" => Some(MatchType::Range),
            "compound" => Some(MatchType::Compound),
            "ipcidr" => Some(MatchType::Ipcidr),
            _ => None,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The set of managed nodes a command applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Target expression (e.g. `I@salt:master`, `web*`).
    pub expression: String,
    /// How the expression is matched.
    pub match_type: MatchType,
}

impl Target {
    /// Create a target with an explicit match type.
    pub fn new(expression: impl Into<String>, match_type: MatchType) -> Self {
        Self {
            expression: expression.into(),
            match_type,
        }
    }

    /// Compound matcher target.
    pub fn compound(expression: impl Into<String>) -> Self {
        Self::new(expression, MatchType::Compound)
    }

    /// Glob target.
    pub fn glob(expression: impl Into<String>) -> Self {
        Self::new(expression, MatchType::Glob)
    }

    /// Explicit list of minion ids.
    pub fn list<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expression = nodes
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self::new(expression, MatchType::List)
    }

    /// Pillar match target.
    pub fn pillar(expression: impl Into<String>) -> Self {
        Self::new(expression, MatchType::Pillar)
    }

    /// Grain match target.
    pub fn grain(expression: impl Into<String>) -> Self {
        Self::new(expression, MatchType::Grain)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.expression, self.match_type)
    }
}

/// Rolling-batch directive: how many targeted nodes execute at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchPolicy {
    /// Absolute number of nodes per batch.
    Count(u32),
    /// Percentage of the targeted nodes per batch, e.g. `"25%"`.
    Percent(String),
}

impl BatchPolicy {
    /// Whether this policy enables batched execution.
    ///
    /// A count must be positive; a percentage string must contain `%`.
    pub fn is_valid(&self) -> bool {
        match self {
            BatchPolicy::Count(n) => *n > 0,
            BatchPolicy::Percent(s) => s.contains('%'),
        }
    }
}

impl FromStr for BatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains('%') {
            return Ok(BatchPolicy::Percent(s.to_string()));
        }
        s.parse::<u32>()
            .map(BatchPolicy::Count)
            .map_err(|_| format!("invalid batch size '{s}': expected a count or a percentage"))
    }
}

impl fmt::Display for BatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchPolicy::Count(n) => write!(f, "{n}"),
            BatchPolicy::Percent(s) => write!(f, "{s}"),
        }
    }
}

/// salt-api client interface a command is dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMode {
    /// Run on all targeted minions at once.
    #[default]
    Local,
    /// Run on targeted minions in rolling batches.
    LocalBatch,
    /// Fire and forget; returns a job id.
    LocalAsync,
    /// Master-side runner module.
    Runner,
    /// Master-side wheel module.
    Wheel,
}

impl ClientMode {
    /// Whether this client targets minions (and so takes `expr_form`).
    pub fn targets_minions(&self) -> bool {
        matches!(
            self,
            ClientMode::Local | ClientMode::LocalBatch | ClientMode::LocalAsync
        )
    }
}

/// Per-operation options for facade calls.
///
/// Each facade operation starts from its own defaults; use the builder
/// methods to override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Optional rolling-batch policy.
    pub batch: Option<BatchPolicy>,
    /// Raise on the first failed resource instead of reporting it.
    pub fail_on_error: bool,
    /// Emit per-node reports.
    pub print_results: bool,
    /// Hide successful resources that changed nothing.
    pub print_only_changes: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch: None,
            fail_on_error: true,
            print_results: true,
            print_only_changes: false,
        }
    }
}

impl RunOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default options for operations that run quietly.
    pub fn quiet() -> Self {
        Self {
            print_results: false,
            ..Self::default()
        }
    }

    /// Set the batch policy.
    pub fn batch(mut self, batch: BatchPolicy) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Set whether failures raise.
    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    /// Set whether reports are printed.
    pub fn print_results(mut self, print: bool) -> Self {
        self.print_results = print;
        self
    }

    /// Set whether unchanged successes are hidden.
    pub fn print_only_changes(mut self, only_changes: bool) -> Self {
        self.print_only_changes = only_changes;
        self
    }
}

/// Key pair generated for a new minion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeKey {
    /// Public key (PEM).
    pub public: String,
    /// Private key (PEM).
    pub private: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_names() {
        assert_eq!(MatchType::Compound.as_str(), "compound");
        assert_eq!(MatchType::GrainPcre.as_str(), "grain_pcre");
        assert_eq!(MatchType::from_name("LIST"), Some(MatchType::List));
        assert_eq!(MatchType::from_name("pillar_pcre"), Some(MatchType::PillarPcre));
        assert_eq!(MatchType::from_name("bogus"), None);
        assert_eq!(MatchType::default(), MatchType::Compound);
    }

    #[test]
    fn test_target_constructors() {
        let t = Target::compound("I@salt:master");
        assert_eq!(t.match_type, MatchType::Compound);
        assert_eq!(t.expression, "I@salt:master");

        let list = Target::list(["ctl01", "ctl02", "ctl03"]);
        assert_eq!(list.match_type, MatchType::List);
        assert_eq!(list.expression, "ctl01,ctl02,ctl03");

        assert_eq!(Target::glob("web*").to_string(), "web* (glob)");
    }

    #[test]
    fn test_batch_policy_validity() {
        assert!(BatchPolicy::Count(5).is_valid());
        assert!(!BatchPolicy::Count(0).is_valid());
        assert!(BatchPolicy::Percent("25%".to_string()).is_valid());
        assert!(!BatchPolicy::Percent("25".to_string()).is_valid());
    }

    #[test]
    fn test_batch_policy_parse() {
        assert_eq!("10".parse::<BatchPolicy>(), Ok(BatchPolicy::Count(10)));
        assert_eq!(
            " 30% ".parse::<BatchPolicy>(),
            Ok(BatchPolicy::Percent("30%".to_string()))
        );
        assert!("ten".parse::<BatchPolicy>().is_err());
        assert!("-1".parse::<BatchPolicy>().is_err());
    }

    #[test]
    fn test_batch_policy_serializes_untagged() {
        assert_eq!(serde_json::to_value(BatchPolicy::Count(3)).unwrap(), 3);
        assert_eq!(
            serde_json::to_value(BatchPolicy::Percent("10%".to_string())).unwrap(),
            "10%"
        );
    }

    #[test]
    fn test_client_mode_serialization() {
        assert_eq!(
            serde_json::to_value(ClientMode::LocalBatch).unwrap(),
            "local_batch"
        );
        assert!(ClientMode::Local.targets_minions());
        assert!(ClientMode::LocalAsync.targets_minions());
        assert!(!ClientMode::Runner.targets_minions());
        assert!(!ClientMode::Wheel.targets_minions());
    }

    #[test]
    fn test_run_options_builders() {
        let opts = RunOptions::new();
        assert!(opts.fail_on_error);
        assert!(opts.print_results);
        assert!(!opts.print_only_changes);
        assert!(opts.batch.is_none());

        let quiet = RunOptions::quiet()
            .batch(BatchPolicy::Count(2))
            .fail_on_error(false)
            .print_only_changes(true);
        assert!(!quiet.print_results);
        assert!(!quiet.fail_on_error);
        assert!(quiet.print_only_changes);
        assert_eq!(quiet.batch, Some(BatchPolicy::Count(2)));
    }
}
