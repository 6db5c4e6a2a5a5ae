//! Shared HTTP plumbing for the hosted database and auth APIs.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, Url};
use serde_json::Value;

const API_KEY_HEADER: &str = "apikey";

#[derive(Debug)]
pub enum BackendError {
    InvalidUrl(String),
    Transport(Box<reqwest::Error>),
    Status { status: u16, message: String },
    Decode(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(message) => write!(f, "invalid backend URL: {message}"),
            Self::Transport(err) => write!(f, "backend request failed: {err}"),
            Self::Status { status, message } => write!(f, "backend returned {status}: {message}"),
            Self::Decode(message) => write!(f, "unexpected backend response: {message}"),
        }
    }
}

impl Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Authenticated HTTP client for one backend project.
///
/// Every request carries the access key both as `apikey` and as a bearer
/// token.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Arc<str>,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Creates a client for the project at `base_url`.
    ///
    /// # Errors
    /// Returns `BackendError` if the URL does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(http, base_url, api_key)
    }

    /// Creates a client that reuses an existing `reqwest::Client`.
    ///
    /// # Errors
    /// Returns `BackendError` if the URL does not parse.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|err| BackendError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        // Relative joins replace the last path segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            api_key: Arc::from(api_key.into()),
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::InvalidUrl(format!("{path}: {err}")))
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.as_ref())
            .bearer_auth(self.api_key.as_ref())
    }
}

/// Passes successful responses through and turns the rest into
/// `BackendError::Status` with the most specific message the body offers.
pub(crate) async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        }),
    })
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let client = BackendClient::new("https://example.test/project", "key").expect("client");

        let url = client.endpoint("rest/v1/users").expect("endpoint");

        assert_eq!(url.as_str(), "https://example.test/project/rest/v1/users");
    }

    #[test]
    fn rejects_unparseable_urls() {
        let err = BackendClient::new("not a url", "key").expect_err("invalid URL");
        assert!(matches!(err, BackendError::InvalidUrl(_)));
    }

    #[test]
    fn extracts_messages_from_known_error_shapes() {
        assert_eq!(
            error_message(r#"{"code":"42P01","message":"relation \"nope\" does not exist"}"#),
            Some("relation \"nope\" does not exist".to_string())
        );
        assert_eq!(
            error_message(r#"{"msg":"User not allowed"}"#),
            Some("User not allowed".to_string())
        );
        assert_eq!(error_message("<html>bad gateway</html>"), None);
    }
}
