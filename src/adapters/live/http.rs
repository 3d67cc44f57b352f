//! Live adapter for the HTTP port, backed by `reqwest`.

use reqwest::Client;

use crate::ports::http::{HttpClient, HttpFuture, HttpReply, HttpRequest, Method};

/// Live HTTP client that performs real network requests.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new client with default connection settings.
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn send(&self, request: &HttpRequest) -> HttpFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self.client.post(&request.url),
            };

            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(ref token) = request.bearer {
                builder = builder.bearer_auth(token);
            }
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();

            Ok(HttpReply { status, body })
        })
    }
}
