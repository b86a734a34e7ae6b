//! HTTP transport for the Redfish service.
//! Basic auth, no certificate verification. Reads carry the configured
//! timeout; writes only the client-wide ceiling.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use super::error::{RedfishError, Result};
use super::types::Reply;

/// Ceiling for POST, PATCH and DELETE. Controllers can take minutes to
/// accept a BIOS job or a reset.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

/// One request against the controller. `path` is absolute on the host
/// (`/redfish/v1/...`).
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(method: Method, path: impl Into<String>, body: Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// Transient: timed out waiting for the controller
    #[error("request timed out")]
    Timeout,

    /// Transient: connection refused, reset, TLS handshake failure...
    #[error("connection failed: {0}")]
    Connection(String),

    /// Not transient: the request could not be built at all
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Invalid(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::Invalid(e.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

/// Sends requests to a single controller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> std::result::Result<Reply, TransportError>;
}

/// Opens a transport per host. The orchestrator holds one for the whole run.
pub trait Connector: Send + Sync {
    fn connect(&self, host: &str) -> Result<Arc<dyn Transport>>;
}

/// Basic credentials for the controller.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
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
            .field("password", &"********")
            .finish()
    }
}

/// reqwest-backed transport talking HTTPS to `https://<host>`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    read_timeout: Duration,
}

impl HttpTransport {
    pub fn new(host: &str, credentials: Credentials, read_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(WRITE_TIMEOUT)
            .build()
            .map_err(|e| {
                RedfishError::CommunicationFailure(format!("{} (client setup: {})", host, e))
            })?;

        Ok(Self {
            client,
            base_url: format!("https://{}", host),
            credentials,
            read_timeout,
        })
    }

    fn timeout_for(&self, method: Method) -> Duration {
        match method {
            Method::Get => self.read_timeout,
            _ => WRITE_TIMEOUT,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> std::result::Result<Reply, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        trace!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(method, &url)
            .timeout(self.timeout_for(request.method))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));

        if request.method != Method::Get {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // 204 carries no body; everything else is read in full so error
        // payloads are available to the caller.
        let body = if status == 204 {
            String::new()
        } else {
            response.text().await?
        };

        debug!("{} {} -> {}", request.method, request.path, status);

        Ok(Reply {
            status,
            body,
            location,
        })
    }
}

/// Opens an [`HttpTransport`] for every host with the same credentials.
pub struct HttpConnector {
    credentials: Credentials,
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(credentials: Credentials, timeout: Duration) -> Self {
        Self {
            credentials,
            timeout,
        }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, host: &str) -> Result<Arc<dyn Transport>> {
        let transport = HttpTransport::new(host, self.credentials.clone(), self.timeout)?;
        Ok(Arc::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("root", "calvin");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("root"));
        assert!(!debug.contains("calvin"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Connection("reset".into()).is_transient());
        assert!(!TransportError::Invalid("bad url".into()).is_transient());
    }

    #[test]
    fn test_http_connector_builds_transport() {
        let connector = HttpConnector::new(
            Credentials::new("root", "calvin"),
            Duration::from_secs(60),
        );
        assert!(connector.connect("mgmt-r1-u2-b03-640.example.com").is_ok());
    }

    #[test]
    fn test_read_timeout_applies_to_gets_only() {
        let transport = HttpTransport::new(
            "mgmt-r1-u2-b03-640.example.com",
            Credentials::new("root", "calvin"),
            Duration::from_secs(60),
        )
        .unwrap();
        assert_eq!(transport.timeout_for(Method::Get), Duration::from_secs(60));
        assert_eq!(transport.timeout_for(Method::Post), WRITE_TIMEOUT);
        assert_eq!(transport.timeout_for(Method::Patch), WRITE_TIMEOUT);
        assert_eq!(transport.timeout_for(Method::Delete), WRITE_TIMEOUT);
    }
}
