use anyhow::Result;
use saltkit::{Client, WalkSummary};

use super::{connect, run_options, target};
use crate::Context;
use crate::ui;

pub fn apply(ctx: &Context, expression: &str, states: &[String]) -> Result<()> {
    let client = connect(ctx)?;
    let summary = client.enforce_state(
        &target(ctx, expression),
        states,
        &run_options(ctx, true),
    )?;
    finish(ctx, &format!("state {}", states.join(",")), &summary)
}

pub fn highstate(ctx: &Context, expression: &str, print: bool) -> Result<()> {
    let client = connect(ctx)?;
    let summary = client.highstate(&target(ctx, expression), &run_options(ctx, print))?;
    finish(ctx, "highstate", &summary)
}

pub fn orchestrate(ctx: &Context, name: &str) -> Result<()> {
    let client = connect(ctx)?;
    let summary = orchestrate_with(&client, ctx, name)?;
    finish(ctx, &format!("orchestration {name}"), &summary)
}

fn orchestrate_with(client: &Client, ctx: &Context, name: &str) -> Result<WalkSummary> {
    // runners ignore the target; salt-api still requires one
    let summary = client.orchestrate(&target(ctx, "*"), name, &run_options(ctx, true))?;
    Ok(summary)
}

pub fn sync(ctx: &Context, expression: &str, print: bool) -> Result<()> {
    let client = connect(ctx)?;
    let summary = client.sync_all(&target(ctx, expression), &run_options(ctx, print))?;
    finish(ctx, "sync", &summary)
}

/// Print the outcome and turn recorded failures into a non-zero exit.
pub(super) fn finish(ctx: &Context, label: &str, summary: &WalkSummary) -> Result<()> {
    if !summary.failures.is_empty() {
        for failure in &summary.failures {
            ui::warn(&format!("{} failed on {}", failure.resource, failure.node));
        }
        anyhow::bail!(
            "{label}: {} resource(s) failed ({})",
            summary.failures.len(),
            ui::summary_line(summary)
        );
    }

    if !summary.empty_rounds.is_empty() {
        ui::warn(&format!("{label}: salt-api returned no data for some rounds"));
    }

    if !ctx.quiet {
        ui::success(&format!("{label}: {}", ui::summary_line(summary)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::config::{Config, Settings};
    use clap::Parser;
    use saltkit::{Credentials, FailureRecord, MemoryReporter, MockTransport};
    use serde_json::json;

    fn context(args: &[&str]) -> Context {
        let cli = Cli::try_parse_from(args).unwrap();
        let config = Config::default();
        let settings = Settings::resolve(&cli, &config);
        Context {
            quiet: true,
            config,
            settings,
        }
    }

    #[test]
    fn test_finish_ok() {
        let ctx = context(&["saltpipe", "minions"]);
        let summary = WalkSummary {
            succeeded: 2,
            ..WalkSummary::default()
        };
        assert!(finish(&ctx, "highstate", &summary).is_ok());
    }

    #[test]
    fn test_finish_with_recorded_failures() {
        let ctx = context(&["saltpipe", "--no-fail", "minions"]);
        let summary = WalkSummary {
            failed: 1,
            failures: vec![FailureRecord {
                node: "node1".to_string(),
                resource: "r1".to_string(),
            }],
            ..WalkSummary::default()
        };
        let err = finish(&ctx, "highstate", &summary).unwrap_err();
        assert!(err.to_string().contains("1 resource(s) failed"));
    }

    #[test]
    fn test_orchestrate_uses_runner() {
        let ctx = context(&["saltpipe", "orchestrate", "orchestrate.deploy"]);
        let mock = MockTransport::with_login("tok");
        mock.push_response(json!({"return": [{
            "data": {"master": {"r": {"result": true, "changes": {"ok": true}}}}
        }]}));
        let client = Client::connect(Box::new(mock.clone()), "https://salt", &Credentials::new("u", "p"))
            .unwrap()
            .with_reporter(Box::new(MemoryReporter::new()));

        let summary = orchestrate_with(&client, &ctx, "orchestrate.deploy").unwrap();
        assert_eq!(summary.succeeded, 1);

        let body = mock.last_request().and_then(|r| r.body).unwrap();
        assert_eq!(body["client"], "runner");
        assert_eq!(body["arg"], json!(["orchestrate.deploy"]));
    }
}
