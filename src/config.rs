use anyhow::{Context as _, Result};
use saltkit::{BatchPolicy, CredentialStore, Credentials, DEFAULT_ESCALATION_TIMEOUT, MatchType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cli::Cli;
use crate::paths;

// ============================================================================
// Config File
// ============================================================================

/// Contents of `config.toml`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// salt-api base URL.
    pub endpoint: Option<String>,
    /// HTTP timeout for each salt-api call.
    pub timeout_secs: Option<u64>,
    /// Credential sets by id.
    pub credentials: BTreeMap<String, CredentialEntry>,
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password; wins over `password`.
    #[serde(default)]
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub credentials: String,
    pub fail_on_error: bool,
    pub print_only_changes: bool,
    pub ask_on_error: bool,
    pub escalation_timeout_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            credentials: "salt-api".to_string(),
            fail_on_error: true,
            print_only_changes: false,
            ask_on_error: false,
            escalation_timeout_secs: DEFAULT_ESCALATION_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the config directory; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse config TOML
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl CredentialStore for Config {
    fn credentials(&self, id: &str) -> saltkit::Result<Credentials> {
        let entry = self.credentials.get(id).ok_or_else(|| {
            saltkit::Error::Credentials(format!("no [credentials.{id}] section in config"))
        })?;

        let password = match (&entry.password_env, &entry.password) {
            (Some(var), _) => std::env::var(var).map_err(|_| {
                saltkit::Error::Credentials(format!(
                    "environment variable {var} for credentials '{id}' is not set"
                ))
            })?,
            (None, Some(password)) => password.clone(),
            (None, None) => {
                return Err(saltkit::Error::Credentials(format!(
                    "credentials '{id}' have neither password nor password_env"
                )));
            }
        };

        Ok(Credentials::new(entry.username.clone(), password))
    }
}

// ============================================================================
// Effective Settings
// ============================================================================

/// Config file values with command-line overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub credentials: String,
    pub timeout: Option<Duration>,
    pub match_type: MatchType,
    pub batch: Option<BatchPolicy>,
    pub fail_on_error: bool,
    pub print_only_changes: bool,
    pub ask_on_error: bool,
    pub escalation_timeout: Duration,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        let defaults = &config.defaults;
        Self {
            endpoint: cli.endpoint.clone().or_else(|| config.endpoint.clone()),
            credentials: cli
                .credentials
                .clone()
                .unwrap_or_else(|| defaults.credentials.clone()),
            timeout: config.timeout_secs.map(Duration::from_secs),
            match_type: cli.match_type,
            batch: cli.batch.clone(),
            fail_on_error: defaults.fail_on_error && !cli.no_fail,
            print_only_changes: defaults.print_only_changes || cli.only_changes,
            ask_on_error: cli.ask_on_error.unwrap_or(defaults.ask_on_error),
            escalation_timeout: Duration::from_secs(
                cli.escalation_timeout
                    .unwrap_or(defaults.escalation_timeout_secs),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    const SAMPLE: &str = r#"
endpoint = "https://salt.example.com:8000"
timeout_secs = 60

[credentials.salt-api]
username = "jenkins"
password = "literal"

[credentials.from-env]
username = "deploy"
password_env = "SALTPIPE_TEST_PASSWORD"

[credentials.broken]
username = "nobody"

[defaults]
print_only_changes = true
escalation_timeout_secs = 600
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://salt.example.com:8000"));
        assert_eq!(config.timeout_secs, Some(60));
        assert_eq!(config.credentials.len(), 3);
        assert!(config.defaults.print_only_changes);
        assert!(config.defaults.fail_on_error);
        assert_eq!(config.defaults.credentials, "salt-api");
    }

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("").unwrap();
        assert!(config.endpoint.is_none());
        assert_eq!(config.defaults.escalation_timeout_secs, 3600);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Config::parse("endpoint = [").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.credentials["salt-api"].username, "jenkins");

        let missing = Config::load_from(&dir.path().join("missing.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_credential_store() {
        let config = Config::parse(SAMPLE).unwrap();

        let creds = config.credentials("salt-api").unwrap();
        assert_eq!(creds.username, "jenkins");
        assert_eq!(creds.password, "literal");

        let err = config.credentials("broken").unwrap_err();
        assert!(matches!(err, saltkit::Error::Credentials(_)));

        let err = config.credentials("unknown").unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_credential_store_env() {
        let config = Config::parse(SAMPLE).unwrap();

        // SAFETY: no other test reads this variable
        unsafe { std::env::set_var("SALTPIPE_TEST_PASSWORD", "from-env") };
        let creds = config.credentials("from-env").unwrap();
        assert_eq!(creds.password, "from-env");

        // SAFETY: see above
        unsafe { std::env::remove_var("SALTPIPE_TEST_PASSWORD") };
        assert!(config.credentials("from-env").is_err());
    }

    #[test]
    fn test_settings_cli_overrides_file() {
        let config = Config::parse(SAMPLE).unwrap();
        let cli = Cli::try_parse_from([
            "saltpipe",
            "--endpoint",
            "https://other:8000",
            "--credentials",
            "from-env",
            "--no-fail",
            "--batch",
            "10%",
            "--escalation-timeout",
            "30",
            "--ask-on-error",
            "highstate",
            "web*",
        ])
        .unwrap();

        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.endpoint.as_deref(), Some("https://other:8000"));
        assert_eq!(settings.credentials, "from-env");
        assert!(!settings.fail_on_error);
        assert!(settings.print_only_changes);
        assert!(settings.ask_on_error);
        assert_eq!(settings.batch, Some(BatchPolicy::Percent("10%".to_string())));
        assert_eq!(settings.escalation_timeout, Duration::from_secs(30));
        assert_eq!(settings.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_settings_from_file_defaults() {
        let config = Config::parse(SAMPLE).unwrap();
        let cli = Cli::try_parse_from(["saltpipe", "--ask-on-error=false", "sync", "*"]).unwrap();

        let settings = Settings::resolve(&cli, &config);
        assert_eq!(settings.endpoint.as_deref(), Some("https://salt.example.com:8000"));
        assert_eq!(settings.credentials, "salt-api");
        assert!(settings.fail_on_error);
        assert!(!settings.ask_on_error);
        assert_eq!(settings.escalation_timeout, Duration::from_secs(600));
        assert_eq!(settings.match_type, MatchType::Compound);
    }
}
