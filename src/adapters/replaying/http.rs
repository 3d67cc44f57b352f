//! Replaying adapter for the `HttpClient` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::error::DrawError;
use crate::ports::http::{HttpClient, HttpFuture, HttpReply, HttpRequest};

/// Serves recorded HTTP replies from a cassette, in recorded order per method.
pub struct ReplayingHttpClient {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingHttpClient {
    /// Create a replaying client backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl HttpClient for ReplayingHttpClient {
    fn send(&self, request: &HttpRequest) -> HttpFuture<'_> {
        let output = next_output(&self.replayer, "http", request.method.as_str());
        Box::pin(async move {
            let output = output.map_err(DrawError::Config)?;
            replay_result::<HttpReply>(output).map_err(|message| DrawError::Api { status: 0, message })
        })
    }
}
