//! HTTP transport backed by ureq.

use crate::error::Result;
use crate::transport::{HttpRequest, Method, Transport};
use serde_json::Value;
use std::time::Duration;

/// Blocking HTTP transport for salt-api.
///
/// # Example
///
/// ```no_run
/// use saltkit::transport::{HttpRequest, Transport};
/// use saltkit::transport::http::HttpTransport;
/// use serde_json::json;
///
/// let transport = HttpTransport::new();
/// let body = transport
///     .submit(&HttpRequest::post("https://salt.example.com:8000/", json!({"fun": "test.ping"})))
///     .unwrap();
/// println!("{body}");
/// ```
pub struct HttpTransport {
    /// HTTP agent for requests.
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport with ureq's default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    /// Create a transport whose calls fail after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn submit(&self, request: &HttpRequest) -> Result<Value> {
        log::debug!("{} {}", request.method, request.url);

        let mut response = match request.method {
            Method::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()?
            }
            Method::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    Some(body) => builder.send_json(body)?,
                    None => builder.send_empty()?,
                }
            }
        };

        log::trace!("{} {} -> {}", request.method, request.url, response.status());

        let body: Value = response.body_mut().read_json()?;
        Ok(body)
    }
}
