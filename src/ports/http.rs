//! HTTP port used for image downloads, URL conversion and generation calls.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DrawError;

/// HTTP method of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`, used for downloads and the conversion service.
    Get,
    /// `POST` with a JSON body, used for generation.
    Post,
}

impl Method {
    /// Lowercase name, used as the cassette method key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
        }
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Target URL, without query string.
    pub url: String,
    /// Query parameters appended to the URL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    /// Bearer token. Never written to cassettes.
    #[serde(skip)]
    pub bearer: Option<String>,
    /// JSON body for `POST` requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// A plain `GET` of the given URL.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::Get, url: url.into(), query: Vec::new(), bearer: None, body: None }
    }

    /// A `POST` of a JSON body.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: Some(body),
        }
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a bearer token.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    #[serde(with = "base64_bytes")]
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Build a reply from a status and a textual body.
    #[cfg(test)]
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into().into_bytes() }
    }

    /// Whether the status is exactly 200.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Boxed future type returned by [`HttpClient::send`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpReply, DrawError>> + Send + 'a>>;

/// Sends HTTP requests and reads the full response body.
///
/// Implementations do not apply timeouts; callers wrap calls in their own
/// time budget.
pub trait HttpClient: Send + Sync {
    /// Send the request and return the status and body.
    fn send(&self, request: &HttpRequest) -> HttpFuture<'_>;
}

/// Send a request through `client`, failing with [`DrawError::Timeout`] if no
/// complete reply arrives within `timeout`.
///
/// # Errors
///
/// Returns the client's error, or a timeout error.
pub async fn send_with_timeout(
    client: &dyn HttpClient,
    request: &HttpRequest,
    timeout: Duration,
) -> Result<HttpReply, DrawError> {
    tokio::time::timeout(timeout, client.send(request))
        .await
        .map_err(|_| DrawError::Timeout { seconds: timeout.as_secs() })?
}

/// Serde helper for serializing `Vec<u8>` as base64 strings in cassettes.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64 string.
    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        serializer.serialize_str(&encoded)
    }

    /// Deserialize base64 string to bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
