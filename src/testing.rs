//! Scripted in-memory HTTP client for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::DrawError;
use crate::ports::http::{HttpClient, HttpFuture, HttpReply, HttpRequest, Method};

/// One scripted response.
pub(crate) enum Step {
    /// Reply with this status and body.
    Reply(HttpReply),
    /// Fail as a transport error.
    Fail(&'static str),
    /// Never complete; only a caller-side timeout ends the call.
    Hang,
}

impl Step {
    pub(crate) fn text(status: u16, body: &str) -> Self {
        Self::Reply(HttpReply::text(status, body))
    }

    pub(crate) fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self::Reply(HttpReply { status, body })
    }
}

/// Serves [`Step`]s in order and remembers every request it saw.
pub(crate) struct ScriptedHttp {
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub(crate) fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into()), seen: Mutex::new(Vec::new()) })
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, method: Method) -> usize {
        self.seen.lock().unwrap().iter().filter(|r| r.method == method).count()
    }
}

impl HttpClient for ScriptedHttp {
    fn send(&self, request: &HttpRequest) -> HttpFuture<'_> {
        self.seen.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front();
        Box::pin(async move {
            match step {
                Some(Step::Reply(reply)) => Ok(reply),
                Some(Step::Fail(message)) => {
                    Err(DrawError::Api { status: 0, message: message.to_string() })
                }
                Some(Step::Hang) => std::future::pending().await,
                None => Err(DrawError::Config("script exhausted".into())),
            }
        })
    }
}
