//! # saltkit
//!
//! Pure Rust library for driving SaltStack through salt-api.
//!
//! This crate provides functionality for:
//! - Logging in to salt-api and carrying the session token
//! - Building command payloads (targeting, batching, arguments)
//! - Interpreting the heterogeneous results salt returns per node and resource
//! - Reporting per-node changes and failing, continuing or asking an operator
//!   when a resource fails
//!
//! ## Example
//!
//! ```no_run
//! use saltkit::{Client, Credentials, RunOptions, Target};
//!
//! let client = Client::login(
//!     "https://salt.example.com:8000",
//!     &Credentials::new("jenkins", "secret"),
//! )
//! .expect("login failed");
//!
//! let summary = client
//!     .enforce_state(&Target::compound("I@nginx:server"), &["nginx"], &RunOptions::default())
//!     .expect("state failed");
//!
//! println!("{} resources succeeded", summary.succeeded);
//! ```
//!
//! ## Testing
//!
//! [`MockTransport`] answers requests from a queue and [`MemoryReporter`]
//! captures what would have been printed:
//!
//! ```
//! use saltkit::{Client, Credentials, MemoryReporter, MockTransport, RunOptions, Target};
//! use serde_json::json;
//!
//! let mock = MockTransport::with_login("token");
//! mock.push_response(json!({"return": [{"node1": true, "node2": false}]}));
//!
//! let client = Client::connect(Box::new(mock), "https://salt", &Credentials::new("u", "p"))
//!     .unwrap()
//!     .with_reporter(Box::new(MemoryReporter::new()));
//!
//! let minions = client.active_minions(&Target::glob("*")).unwrap();
//! assert_eq!(minions, vec!["node1".to_string()]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod escalate;
pub mod payload;
pub mod report;
pub mod session;
pub mod transport;
pub mod types;
pub mod walker;

pub use command::{CommandBuilder, CommandRequest};
pub use error::{Error, ErrorCategory, Result};
pub use escalate::{
    AutoAbort, DEFAULT_ESCALATION_TIMEOUT, Escalation, EscalationDecision, EscalationRequest,
    ScriptedEscalation,
};
pub use payload::{RawResponse, ResourcePayload};
pub use report::{
    Classification, MemoryReporter, NodeReport, Notice, ReportEntry, Reporter, TerminalReporter,
};
pub use session::{CredentialStore, Credentials, Session, StaticCredentialStore};
pub use transport::MockTransport;
pub use types::{BatchPolicy, ClientMode, MatchType, NodeKey, RunOptions, Target};
pub use walker::{FailureRecord, ResultWalker, WalkOptions, WalkSummary};

use serde_json::{Map, Value};
use std::time::Duration;
use transport::http::HttpTransport;
use transport::{HttpRequest, Transport};

/// Text appended to shell commands and looked for in their output.
pub const SENTINEL: &str = "Salt command execution success";

/// High-level client for salt-api operations.
///
/// Every operation is synchronous: build the command, send it, interpret the
/// answer. The client holds no state besides its immutable session, so one
/// client may be shared across threads.
pub struct Client {
    transport: Box<dyn Transport>,
    session: Session,
    reporter: Box<dyn Reporter>,
    escalation: Box<dyn Escalation>,
    escalate_on_failure: bool,
    escalation_timeout: Duration,
}

impl Client {
    /// Log in over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if salt-api issued no token, or
    /// [`Error::Transport`] if the endpoint could not be reached.
    pub fn login(endpoint: &str, credentials: &Credentials) -> Result<Self> {
        Self::connect(Box::new(HttpTransport::new()), endpoint, credentials)
    }

    /// Log in through a custom transport (useful for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Client::login`].
    pub fn connect(
        transport: Box<dyn Transport>,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<Self> {
        let session = Session::login(transport.as_ref(), endpoint, credentials)?;
        Ok(Self::with_session(transport, session))
    }

    /// Create a client around an existing session.
    #[must_use]
    pub fn with_session(transport: Box<dyn Transport>, session: Session) -> Self {
        Self {
            transport,
            session,
            reporter: Box::new(TerminalReporter),
            escalation: Box::new(AutoAbort),
            escalate_on_failure: false,
            escalation_timeout: DEFAULT_ESCALATION_TIMEOUT,
        }
    }

    /// Send node reports and notices to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Ask `escalation` on failures once escalation is enabled.
    #[must_use]
    pub fn with_escalation(mut self, escalation: Box<dyn Escalation>) -> Self {
        self.escalation = escalation;
        self
    }

    /// Enable or disable asking an operator on failure.
    #[must_use]
    pub fn escalate_on_failure(mut self, enabled: bool, timeout: Duration) -> Self {
        self.escalate_on_failure = enabled;
        self.escalation_timeout = timeout;
        self
    }

    /// The authenticated session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // =========================================================================
    // Raw Operations
    // =========================================================================

    /// Send a command and parse the response without interpreting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the call failed and [`Error::Protocol`]
    /// if the body has no `return` list.
    pub fn submit(&self, request: &CommandRequest) -> Result<RawResponse> {
        let http = HttpRequest::post(self.session.command_url(), request.to_payload())
            .with_headers(self.session.auth_headers());

        let body = self.transport.submit(&http)?;
        RawResponse::from_value(&body)
    }

    /// Interpret a response with this client's reporter and escalation.
    ///
    /// # Errors
    ///
    /// See [`ResultWalker::walk`].
    pub fn walk(&self, response: &RawResponse, options: &RunOptions) -> Result<WalkSummary> {
        let walk_options = WalkOptions::from(options)
            .escalate(self.escalate_on_failure, self.escalation_timeout);

        ResultWalker::new(walk_options, self.reporter.as_ref())
            .with_escalation(self.escalation.as_ref())
            .walk(response)
    }

    fn execute(&self, request: &CommandRequest, options: &RunOptions) -> Result<WalkSummary> {
        let response = self.submit(request)?;
        let response = if request.client.targets_minions() {
            response
        } else {
            response.unwrap_envelopes()
        };
        self.walk(&response, options)
    }

    // =========================================================================
    // State Operations
    // =========================================================================

    /// Apply states with `state.sls`.
    ///
    /// Pipelines usually pass [`RunOptions::default`], which prints results.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateFailure`] for the first failed resource when
    /// `fail_on_error` is set, plus any transport or protocol error.
    pub fn enforce_state<S: AsRef<str>>(
        &self,
        target: &Target,
        states: &[S],
        options: &RunOptions,
    ) -> Result<WalkSummary> {
        if states.is_empty() {
            return Err(Error::InvalidRequest("no states given".to_string()));
        }
        let states = states
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");

        log::info!("applying {states} on {target}");
        let request = CommandBuilder::new(target.clone(), "state.sls")
            .batch_opt(options.batch.clone())
            .arg(states)
            .build();
        self.execute(&request, options)
    }

    /// Apply the full highstate.
    ///
    /// Pipelines usually pass [`RunOptions::quiet`].
    ///
    /// # Errors
    ///
    /// Same as [`Client::enforce_state`].
    pub fn highstate(&self, target: &Target, options: &RunOptions) -> Result<WalkSummary> {
        log::info!("applying highstate on {target}");
        let request = CommandBuilder::new(target.clone(), "state.highstate")
            .batch_opt(options.batch.clone())
            .build();
        self.execute(&request, options)
    }

    /// Run an orchestration on the master.
    ///
    /// # Errors
    ///
    /// Same as [`Client::enforce_state`].
    pub fn orchestrate(
        &self,
        target: &Target,
        orchestration: &str,
        options: &RunOptions,
    ) -> Result<WalkSummary> {
        log::info!("running orchestration {orchestration}");
        let request = CommandBuilder::new(target.clone(), "state.orchestrate")
            .client(ClientMode::Runner)
            .arg(orchestration)
            .build();
        self.execute(&request, options)
    }

    // =========================================================================
    // Command Operations
    // =========================================================================

    /// Run a shell command with `cmd.run`.
    ///
    /// With `check`, [`SENTINEL`] is echoed after the command and every node's
    /// output must contain it before the regular walk runs. The verified
    /// response is returned with the walk summary so callers can read the
    /// command output and see failures the walk recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandExecutionFailure`] naming the first node whose
    /// output lacks the sentinel, plus anything [`Client::walk`] raises.
    pub fn run_command(
        &self,
        target: &Target,
        command: &str,
        check: bool,
        options: &RunOptions,
    ) -> Result<(RawResponse, WalkSummary)> {
        let line = if check {
            format!("{command}; echo {SENTINEL}")
        } else {
            command.to_string()
        };

        log::info!("running `{command}` on {target}");
        let request = CommandBuilder::new(target.clone(), "cmd.run")
            .batch_opt(options.batch.clone())
            .arg(line)
            .build();
        let response = self.submit(&request)?;

        if check {
            walker::verify_sentinel(&response, SENTINEL, command)?;
        }
        let summary = self.walk(&response, options)?;
        Ok((response, summary))
    }

    /// Run an arbitrary execution module function.
    ///
    /// Pipelines usually pass [`RunOptions::quiet`].
    ///
    /// # Errors
    ///
    /// Same as [`Client::enforce_state`].
    pub fn run_function(
        &self,
        target: &Target,
        function: &str,
        args: Vec<Value>,
        options: &RunOptions,
    ) -> Result<WalkSummary> {
        let request = CommandBuilder::new(target.clone(), function)
            .batch_opt(options.batch.clone())
            .args(args)
            .build();
        self.execute(&request, options)
    }

    /// Sync custom modules, grains and states to minions.
    ///
    /// # Errors
    ///
    /// Same as [`Client::enforce_state`].
    pub fn sync_all(&self, target: &Target, options: &RunOptions) -> Result<WalkSummary> {
        log::info!("syncing modules on {target}");
        let request = CommandBuilder::new(target.clone(), "saltutil.sync_all")
            .batch_opt(options.batch.clone())
            .build();
        self.execute(&request, options)
    }

    // =========================================================================
    // Node Provisioning
    // =========================================================================

    /// Generate and accept a key pair for `host` on the master.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateFailure`] if the wheel reports `success: false`
    /// and [`Error::Protocol`] if the key pair is missing from the answer.
    pub fn generate_node_key(&self, target: &Target, host: &str, keysize: u32) -> Result<NodeKey> {
        log::info!("generating {keysize}-bit key for {host}");
        let request = CommandBuilder::new(target.clone(), "key.gen_accept")
            .client(ClientMode::Wheel)
            .kwarg("id_", host)
            .kwarg("keysize", keysize)
            .build();
        let response = self.submit(&request)?;

        for round in &response.rounds {
            let success = round.get("data").and_then(|data| data.get("success"));
            if success.is_some_and(|flag| !flag.is_truthy()) {
                return Err(Error::StateFailure {
                    node: host.to_string(),
                    resource: "key.gen_accept".to_string(),
                    output: round.render(),
                });
            }
        }

        let unwrapped = response.unwrap_envelopes();
        let round = unwrapped
            .rounds
            .first()
            .ok_or_else(|| Error::protocol("key.gen_accept returned nothing"))?;
        let field = |name: &str| {
            round
                .get(name)
                .and_then(ResourcePayload::as_text)
                .map(str::to_string)
                .ok_or_else(|| Error::protocol(format!("key.gen_accept answer has no `{name}`")))
        };

        Ok(NodeKey {
            public: field("pub")?,
            private: field("priv")?,
        })
    }

    /// Create reclass metadata for `host` under the `_generated` tree.
    ///
    /// # Errors
    ///
    /// Same as [`Client::enforce_state`].
    pub fn generate_node_metadata(
        &self,
        target: &Target,
        host: &str,
        classes: &[String],
        parameters: Map<String, Value>,
        options: &RunOptions,
    ) -> Result<WalkSummary> {
        log::info!("creating metadata for {host}");
        let request = CommandBuilder::new(target.clone(), "reclass.node_create")
            .args([host, "_generated"])
            .kwarg("classes", classes.to_vec())
            .kwarg("parameters", parameters)
            .build();
        self.execute(&request, options)
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Ids of the minions answering `test.ping`, in the order salt-api listed
    /// them.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors. No answering minion is not an
    /// error.
    pub fn active_minions(&self, target: &Target) -> Result<Vec<String>> {
        let request = CommandBuilder::new(target.clone(), "test.ping").build();
        let response = self.submit(&request)?;

        let minions: Vec<String> = response
            .first_round()
            .into_iter()
            .filter(|(_, alive)| alive.is_truthy())
            .map(|(node, _)| node)
            .collect();

        log::debug!("{} minions answered on {target}", minions.len());
        Ok(minions)
    }

    /// Pillar value `key` per node.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn pillar(&self, target: &Target, key: &str) -> Result<Vec<(String, ResourcePayload)>> {
        self.query(target, "pillar.get", key)
    }

    /// Grain `key` per node.
    ///
    /// # Errors
    ///
    /// Returns transport and protocol errors.
    pub fn grain(&self, target: &Target, key: &str) -> Result<Vec<(String, ResourcePayload)>> {
        self.query(target, "grains.item", key)
    }

    fn query(
        &self,
        target: &Target,
        function: &str,
        key: &str,
    ) -> Result<Vec<(String, ResourcePayload)>> {
        let request = CommandBuilder::new(target.clone(), function)
            .arg(key)
            .build();
        let response = self.submit(&request)?;

        Ok(response
            .first_round()
            .into_iter()
            .map(|(node, value)| (node, value.clone()))
            .collect())
    }
}
