//! Recording adapter for the `HttpClient` port.

use std::sync::{Arc, Mutex};

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::http::{HttpClient, HttpFuture, HttpReply, HttpRequest};

/// Recorded as the error of a call whose future was dropped unfinished,
/// which is how a caller-side timeout ends a call.
pub const CANCELLED: &str = "Request cancelled before a reply arrived";

/// Records HTTP interactions while delegating to an inner client.
pub struct RecordingHttpClient {
    inner: Arc<dyn HttpClient>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingHttpClient {
    /// Creates a new recording client wrapping the given implementation.
    pub fn new(inner: Arc<dyn HttpClient>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

/// One in-flight call. Records [`CANCELLED`] if dropped before completing.
struct InFlight {
    recorder: Arc<Mutex<CassetteRecorder>>,
    request: Option<HttpRequest>,
}

impl InFlight {
    fn complete<E: std::fmt::Display>(mut self, result: &Result<HttpReply, E>) {
        if let Some(request) = self.request.take() {
            record_result(&self.recorder, "http", request.method.as_str(), &request, result);
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            let cancelled: Result<HttpReply, &str> = Err(CANCELLED);
            record_result(&self.recorder, "http", request.method.as_str(), &request, &cancelled);
        }
    }
}

impl HttpClient for RecordingHttpClient {
    fn send(&self, request: &HttpRequest) -> HttpFuture<'_> {
        let in_flight =
            InFlight { recorder: Arc::clone(&self.recorder), request: Some(request.clone()) };
        let request = request.clone();

        Box::pin(async move {
            let result = self.inner.send(&request).await;
            in_flight.complete(&result);
            result
        })
    }
}
