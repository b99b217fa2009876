//! Command request construction.
//!
//! [`CommandBuilder`] assembles the payload salt-api expects:
//!
//! ```json
//! {"tgt": "...", "fun": "...", "client": "...", "expr_form": "...",
//!  "batch": 10, "arg": [...], "kwarg": {...}}
//! ```
//!
//! `expr_form`, `batch`, `arg` and `kwarg` are only present when they carry
//! something; some salt handlers treat a missing `arg` differently from an
//! empty one.

use crate::types::{BatchPolicy, ClientMode, MatchType, Target};
use serde::Serialize;
use serde_json::{Map, Value};

/// A salt-api command, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    /// Target expression.
    #[serde(rename = "tgt")]
    pub target: String,
    /// Execution function, e.g. `state.sls`.
    #[serde(rename = "fun")]
    pub function: String,
    /// Client interface.
    pub client: ClientMode,
    /// Target match type; only sent for minion-targeting clients.
    #[serde(rename = "expr_form", skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    /// Rolling-batch policy; only sent with [`ClientMode::LocalBatch`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchPolicy>,
    /// Positional arguments.
    #[serde(rename = "arg", skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    /// Keyword arguments.
    #[serde(rename = "kwarg", skip_serializing_if = "Option::is_none")]
    pub kwargs: Option<Map<String, Value>>,
}

impl CommandRequest {
    /// Serialize to the JSON body sent to salt-api.
    pub fn to_payload(&self) -> Value {
        // Serializing plain strings, enums and JSON values cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Builder for [`CommandRequest`].
///
/// # Example
///
/// ```
/// use saltkit::{BatchPolicy, ClientMode, CommandBuilder, Target};
///
/// let request = CommandBuilder::new(Target::compound("I@nginx:server"), "state.sls")
///     .batch(BatchPolicy::Count(2))
///     .arg("nginx")
///     .build();
///
/// assert_eq!(request.client, ClientMode::LocalBatch);
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    target: Target,
    function: String,
    client: ClientMode,
    batch: Option<BatchPolicy>,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl CommandBuilder {
    /// Start a command for `function` against `target` using the local client.
    pub fn new(target: Target, function: impl Into<String>) -> Self {
        Self {
            target,
            function: function.into(),
            client: ClientMode::Local,
            batch: None,
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Set the client interface.
    pub fn client(mut self, client: ClientMode) -> Self {
        self.client = client;
        self
    }

    /// Set the rolling-batch policy.
    pub fn batch(mut self, batch: BatchPolicy) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Set an optional rolling-batch policy.
    pub fn batch_opt(mut self, batch: Option<BatchPolicy>) -> Self {
        self.batch = batch;
        self
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append positional arguments.
    pub fn args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Build the request.
    ///
    /// A valid batch policy forces [`ClientMode::LocalBatch`]. Without one the
    /// batch field is dropped and a requested `LocalBatch` falls back to
    /// [`ClientMode::Local`].
    pub fn build(self) -> CommandRequest {
        let (client, batch) = match self.batch {
            Some(batch) if batch.is_valid() => (ClientMode::LocalBatch, Some(batch)),
            _ if self.client == ClientMode::LocalBatch => (ClientMode::Local, None),
            _ => (self.client, None),
        };

        let match_type = client.targets_minions().then_some(self.target.match_type);

        let request = CommandRequest {
            target: self.target.expression,
            function: self.function,
            client,
            match_type,
            batch,
            args: (!self.args.is_empty()).then_some(self.args),
            kwargs: (!self.kwargs.is_empty()).then_some(self.kwargs),
        };

        log::debug!(
            "built {:?} command {} for {}",
            request.client, request.function, request.target
        );

        request
    }
}
