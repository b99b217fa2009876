// Applying states and orchestrations
pub mod state;

// Shell commands and arbitrary functions
pub mod exec;

// Node keys and metadata
pub mod provision;

// Read-only queries
pub mod query;

use anyhow::{Context as _, Result};
use saltkit::transport::http::HttpTransport;
use saltkit::{Client, CredentialStore, RunOptions, Target};

use crate::Context;
use crate::prompt::TerminalPrompt;

/// Log in to salt-api with the resolved settings.
pub fn connect(ctx: &Context) -> Result<Client> {
    let settings = &ctx.settings;
    let endpoint = settings.endpoint.as_deref().context(
        "No salt-api endpoint: pass --endpoint, set SALT_URL or add `endpoint` to config.toml",
    )?;

    let credentials = ctx.config.credentials(&settings.credentials)?;
    let transport = match settings.timeout {
        Some(timeout) => HttpTransport::with_timeout(timeout),
        None => HttpTransport::new(),
    };

    let client = Client::connect(Box::new(transport), endpoint, &credentials)
        .with_context(|| format!("Could not log in to {endpoint}"))?;

    Ok(client
        .with_escalation(Box::new(TerminalPrompt))
        .escalate_on_failure(settings.ask_on_error, settings.escalation_timeout))
}

/// Target from a command-line expression and the selected match type.
pub fn target(ctx: &Context, expression: &str) -> Target {
    Target::new(expression, ctx.settings.match_type)
}

/// Run options from the resolved settings.
pub fn run_options(ctx: &Context, print_results: bool) -> RunOptions {
    let settings = &ctx.settings;
    let options = RunOptions::new()
        .fail_on_error(settings.fail_on_error)
        .print_results(print_results)
        .print_only_changes(settings.print_only_changes);

    match &settings.batch {
        Some(batch) => options.batch(batch.clone()),
        None => options,
    }
}

/// Parse a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}
