//! Transport traits and implementations for reaching salt-api.
//!
//! This module provides the [`Transport`] trait and its implementations. The
//! primary implementation is [`http::HttpTransport`], which talks to a real
//! salt-api endpoint.
//!
//! # Testing
//!
//! Use [`MockTransport`] for testing without network access:
//!
//! ```
//! use saltkit::transport::{HttpRequest, MockTransport, Transport};
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.push_response(json!({"return": [{"node1": true}]}));
//!
//! let request = HttpRequest::post("https://salt.example.com/", json!({"fun": "test.ping"}));
//! let response = mock.submit(&request).unwrap();
//! assert_eq!(response["return"][0]["node1"], true);
//! assert_eq!(mock.requests().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// HTTP method of a salt-api call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request with a JSON body.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers, in order.
    pub headers: Vec<(String, String)>,
    /// JSON body for POST requests.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Create a POST request with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add headers.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport trait for submitting requests to salt-api.
///
/// This abstraction keeps the HTTP stack out of the result engine and lets
/// tests script responses.
pub trait Transport: Send + Sync {
    /// Submit a request and return the decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on network failures and non-2xx statuses,
    /// and [`Error::Protocol`] if the body is not JSON.
    fn submit(&self, request: &HttpRequest) -> Result<Value>;
}

/// Mock transport for testing without network access.
///
/// Responses are returned in the order they were pushed. Every submitted
/// request is recorded. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<Result<Value>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    /// Create a new mock with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that first answers a login with `token`.
    #[must_use]
    pub fn with_login(token: &str) -> Self {
        let mock = Self::new();
        mock.push_response(serde_json::json!({
            "return": [{
                "token": token,
                "expire": 1_700_000_000.0,
                "start": 1_699_956_800.0,
                "user": "jenkins",
                "eauth": "pam",
                "perms": [".*", "@runner", "@wheel"]
            }]
        }));
        mock
    }

    /// Queue a response body.
    pub fn push_response(&self, response: Value) {
        self.push(Ok(response));
    }

    /// Queue an error.
    pub fn push_error(&self, error: Error) {
        self.push(Err(error));
    }

    fn push(&self, entry: Result<Value>) {
        match self.responses.lock() {
            Ok(mut responses) => responses.push_back(entry),
            Err(poisoned) => poisoned.into_inner().push_back(entry),
        }
    }

    /// Requests submitted so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }
}

impl Transport for MockTransport {
    fn submit(&self, request: &HttpRequest) -> Result<Value> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }

        let next = match self.responses.lock() {
            Ok(mut responses) => responses.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };

        next.unwrap_or_else(|| {
            Err(Error::transport(
                format!("no mock response queued for {} {}", request.method, request.url),
                None,
            ))
        })
    }
}
