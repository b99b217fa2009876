use anyhow::{Context as _, Result};
use serde_json::{Map, Value};

use super::state::finish;
use super::{connect, parse_value, run_options, target};
use crate::Context;
use crate::ui;

/// Generate a key pair for `host` and print it as JSON on stdout.
pub fn keygen(ctx: &Context, host: &str, keysize: u32) -> Result<()> {
    let client = connect(ctx)?;
    let key = client.generate_node_key(&target(ctx, "*"), host, keysize)?;

    println!("{}", serde_json::to_string_pretty(&key)?);
    if !ctx.quiet {
        ui::success(&format!("Key for {host} generated and accepted"));
    }
    Ok(())
}

pub fn metadata(
    ctx: &Context,
    master: &str,
    host: &str,
    classes: &[String],
    params: &[String],
) -> Result<()> {
    let parameters = parse_params(params)?;
    let client = connect(ctx)?;
    let summary = client.generate_node_metadata(
        &target(ctx, master),
        host,
        classes,
        parameters,
        &run_options(ctx, true),
    )?;
    finish(ctx, &format!("metadata for {host}"), &summary)
}

/// Parse `key=value` pairs; values are JSON when they parse as JSON.
fn parse_params(params: &[String]) -> Result<Map<String, Value>> {
    let mut parameters = Map::new();
    for param in params {
        let (key, value) = param
            .split_once('=')
            .with_context(|| format!("Invalid parameter '{param}': expected key=value"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid parameter '{param}': empty key");
        }
        parameters.insert(key.to_string(), parse_value(value));
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&[
            "linux_system_codename=noble".to_string(),
            "deploy_address=10.0.0.5".to_string(),
            "replicas=3".to_string(),
            "motd=a=b".to_string(),
        ])
        .unwrap();

        assert_eq!(params["linux_system_codename"], json!("noble"));
        assert_eq!(params["deploy_address"], json!("10.0.0.5"));
        assert_eq!(params["replicas"], json!(3));
        assert_eq!(params["motd"], json!("a=b"));
        // insertion order is kept
        assert_eq!(params.keys().next().map(String::as_str), Some("linux_system_codename"));
    }

    #[test]
    fn test_parse_params_invalid() {
        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=value".to_string()]).is_err());
        assert!(parse_params(&[]).unwrap().is_empty());
    }
}
