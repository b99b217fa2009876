//! salt-api authentication.
//!
//! A [`Session`] is created once per pipeline run by logging in with a
//! username and password. The token it holds never changes afterwards;
//! sessions are not persisted.

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, Transport};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;

/// External authentication scheme sent on login.
pub const EAUTH: &str = "pam";

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "X-Auth-Token";

/// Username and password for salt-api.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of credentials by id.
pub trait CredentialStore {
    /// Look up the credentials stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if `id` is unknown or incomplete.
    fn credentials(&self, id: &str) -> Result<Credentials>;
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add credentials under `id`.
    pub fn with(mut self, id: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(id.into(), credentials);
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credentials(&self, id: &str) -> Result<Credentials> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Credentials(format!("no credentials stored as '{id}'")))
    }
}

/// An authenticated salt-api session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    endpoint: String,
    username: String,
    token: String,
}

impl Session {
    /// Log in to salt-api at `endpoint`.
    ///
    /// Sends `{username, password, eauth}` to `{endpoint}/login` and keeps the
    /// token from the first entry of the first round.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the response has no token, or whatever the
    /// transport returned if the request itself failed.
    pub fn login(
        transport: &dyn Transport,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint);
        let request = HttpRequest::post(
            format!("{endpoint}/login"),
            json!({
                "username": credentials.username,
                "password": credentials.password,
                "eauth": EAUTH,
            }),
        )
        .with_headers([("Accept", "application/json")]);

        let response = transport.submit(&request)?;

        let token = response
            .get("return")
            .and_then(|rounds| rounds.get(0))
            .and_then(|entry| entry.get("token"))
            .and_then(|token| token.as_str())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                Error::Auth(format!(
                    "login response from {endpoint} has no token"
                ))
            })?;

        log::info!("logged in to {endpoint} as {}", credentials.username);

        Ok(Self {
            endpoint,
            username: credentials.username.clone(),
            token: token.to_string(),
        })
    }

    /// Log in with credentials looked up in `store`.
    pub fn login_with_store(
        transport: &dyn Transport,
        endpoint: &str,
        store: &dyn CredentialStore,
        credentials_id: &str,
    ) -> Result<Self> {
        let credentials = store.credentials(credentials_id)?;
        Self::login(transport, endpoint, &credentials)
    }

    /// Build a session from an already issued token.
    pub fn from_token(endpoint: &str, username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint),
            username: username.into(),
            token: token.into(),
        }
    }

    /// Base URL, without trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// User the session belongs to.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// URL commands are posted to.
    pub fn command_url(&self) -> String {
        format!("{}/", self.endpoint)
    }

    /// Headers every authenticated call carries.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            (TOKEN_HEADER.to_string(), self.token.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockTransport};

    fn creds() -> Credentials {
        Credentials::new("jenkins", "s3cret")
    }

    #[test]
    fn test_login_extracts_token() {
        let mock = MockTransport::with_login("abc123");
        let session = Session::login(&mock, "https://salt.example.com:8000/", &creds()).unwrap();

        assert_eq!(session.endpoint(), "https://salt.example.com:8000");
        assert_eq!(session.username(), "jenkins");
        assert_eq!(session.command_url(), "https://salt.example.com:8000/");

        let request = mock.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://salt.example.com:8000/login");
        let body = request.body.unwrap();
        assert_eq!(body["username"], "jenkins");
        assert_eq!(body["password"], "s3cret");
        assert_eq!(body["eauth"], "pam");
    }

    #[test]
    fn test_auth_headers() {
        let session = Session::from_token("https://salt", "jenkins", "tok");
        let headers = session.auth_headers();
        assert!(headers.contains(&("X-Auth-Token".to_string(), "tok".to_string())));
        assert!(headers.contains(&("Accept".to_string(), "application/json".to_string())));
        // calling twice has no side effects
        assert_eq!(headers, session.auth_headers());
    }

    #[test]
    fn test_login_without_token_is_auth_error() {
        let mock = MockTransport::new();
        mock.push_response(serde_json::json!({"return": [{"user": "jenkins"}]}));
        let err = Session::login(&mock, "https://salt", &creds()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));

        mock.push_response(serde_json::json!({"status": 401}));
        let err = Session::login(&mock, "https://salt", &creds()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));

        mock.push_response(serde_json::json!({"return": []}));
        let err = Session::login(&mock, "https://salt", &creds()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_login_transport_error_propagates() {
        let mock = MockTransport::new();
        mock.push_error(Error::transport("HTTP 401", Some(401)));
        let err = Session::login(&mock, "https://salt", &creds()).unwrap_err();
        assert!(matches!(err, Error::Transport { status: Some(401), .. }));
    }

    #[test]
    fn test_login_with_store() {
        let store = StaticCredentialStore::new().with("salt-api", creds());
        let mock = MockTransport::with_login("tok");
        let session = Session::login_with_store(&mock, "https://salt", &store, "salt-api").unwrap();
        assert_eq!(session.username(), "jenkins");

        let err = Session::login_with_store(&mock, "https://salt", &store, "missing").unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", creds());
        assert!(!debug.contains("s3cret"));

        let session = Session::from_token("https://salt", "jenkins", "tok-secret");
        assert!(!format!("{session:?}").contains("tok-secret"));
    }
}
