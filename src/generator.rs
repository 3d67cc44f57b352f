//! Generation calls with bounded, degrading retries.
//!
//! The upstream API sometimes rejects or times out on large image payloads.
//! Each retry after the first shrinks the image further (70% linear, JPEG
//! q80, compounding) and asks for `low` detail, until four attempts are used.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::datauri;
use crate::error::DrawError;
use crate::imaging::{self, Shrink};
use crate::output::preview;
use crate::ports::http::{send_with_timeout, HttpClient, HttpRequest};

/// Time budget for one generation call, including reading the body.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Total attempts per request.
pub const MAX_ATTEMPTS: usize = 4;

/// Pause after a failed attempt when another one follows.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Failure text once every attempt is used up.
pub const RETRIES_EXHAUSTED: &str = "multiple retries failed";

/// Failure text for image mode without an image.
pub const IMAGE_MISSING: &str = "image data missing";

const STREAM_DATA: &str = "data: ";
const STREAM_DONE: &str = "data: [DONE]";

static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)!\[.*?\]\((https?://[^\s)]+)\)").expect("valid markdown image regex")
});
static PARENTHESIZED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((https?://[^\s)]+)\)").expect("valid parenthesized url regex")
});
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(https?://[^\s<>"]+)"#).expect("valid bare url regex"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']'];

/// Whether a request carries a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Prompt only.
    TextToImage,
    /// Prompt plus a source image.
    ImageToImage,
}

/// Image fidelity hint sent with the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    /// First attempt.
    High,
    /// Retries.
    Low,
}

impl Detail {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

/// One generation request; only the image payload changes between attempts.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier, fixed when the request is built.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Source image as a data-URI (image mode only).
    pub image: Option<String>,
    /// Text-only or image+text.
    pub mode: Mode,
}

impl GenerationRequest {
    /// Prompt-only request.
    pub fn text_to_image(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { model: model.into(), prompt: prompt.into(), image: None, mode: Mode::TextToImage }
    }

    /// Prompt plus source image.
    pub fn image_to_image(
        model: impl Into<String>,
        prompt: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            image: Some(image.into()),
            mode: Mode::ImageToImage,
        }
    }
}

/// Terminal result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Whether an image URL was obtained.
    pub success: bool,
    /// The image URL on success, otherwise the failure message.
    pub text: String,
}

impl GenerationResult {
    fn succeeded(url: String) -> Self {
        Self { success: true, text: url }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, text: message.into() }
    }
}

struct Attempt<'a> {
    index: usize,
    detail: Detail,
    image: Option<&'a str>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Concatenate `choices[0].delta.content` over every `data:` line of a
/// streamed body. Unparseable lines are skipped.
#[must_use]
pub fn collect_stream_text(body: &str) -> String {
    body.lines()
        .map(str::trim)
        .filter(|line| *line != STREAM_DONE)
        .filter_map(|line| line.strip_prefix(STREAM_DATA))
        .filter_map(|json| serde_json::from_str::<StreamChunk>(json).ok())
        .filter_map(|chunk| chunk.choices.into_iter().next()?.delta?.content)
        .collect()
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(TRAILING_PUNCTUATION)
}

/// True when `token` is an http(s) URL with something after the scheme.
fn has_url_host(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

/// Find the result image URL in the model's text output.
///
/// Tries a markdown image link, then a parenthesized URL, then a bare URL;
/// as a last resort scans whitespace-separated tokens.
#[must_use]
pub fn extract_result_url(text: &str) -> Option<String> {
    let patterns: [(&Regex, bool); 3] =
        [(&*MARKDOWN_IMAGE, false), (&*PARENTHESIZED_URL, false), (&*BARE_URL, true)];
    for (pattern, trim) in patterns {
        if let Some(captures) = pattern.captures(text) {
            let url = &captures[1];
            let url = if trim { trim_trailing_punctuation(url) } else { url };
            if has_url_host(url) {
                return Some(url.to_string());
            }
        }
    }

    if !text.to_ascii_lowercase().contains("http") {
        return None;
    }
    text.split(|c: char| c.is_whitespace() || "()[]{}<>\"'".contains(c))
        .map(trim_trailing_punctuation)
        .find(|token| has_url_host(token))
        .map(str::to_string)
}

/// Shrink for the next retry; any problem keeps the current image.
fn degrade(current: &str) -> String {
    let before_kb = current.len() as f64 / 1024.0;
    match imaging::shrink_data_uri(current, imaging::SHRINK_SCALE, imaging::SHRINK_QUALITY) {
        Ok(Shrink::Shrunk { data_uri, from, to }) => {
            info!(
                "Shrunk image {}x{} -> {}x{} | {before_kb:.2}KB -> {:.2}KB",
                from.0,
                from.1,
                to.0,
                to.1,
                data_uri.len() as f64 / 1024.0
            );
            data_uri
        }
        Ok(Shrink::AtFloor { size }) => {
            warn!("Image already small ({}x{}), not shrinking", size.0, size.1);
            current.to_string()
        }
        Err(e) => {
            error!("Image shrink failed, retrying with current image: {e}");
            current.to_string()
        }
    }
}

/// Drives generation requests against the chat completions endpoint.
pub struct RetryGenerator {
    http: Arc<dyn HttpClient>,
    api_url: String,
    api_key: Option<String>,
}

impl RetryGenerator {
    /// Create a generator for `api_url`, authenticating with `api_key`.
    pub fn new(http: Arc<dyn HttpClient>, api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { http, api_url: api_url.into(), api_key }
    }

    /// Run up to [`MAX_ATTEMPTS`] sequential attempts; the first URL wins.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut image = match (request.mode, request.image.as_deref()) {
            (Mode::ImageToImage, None) => {
                error!("Image-to-image request without image data");
                return GenerationResult::failed(IMAGE_MISSING);
            }
            (Mode::ImageToImage, Some(data)) => {
                info!("Image-to-image, initial payload {:.2} KB", data.len() as f64 / 1024.0);
                Some(data.to_string())
            }
            (Mode::TextToImage, _) => None,
        };

        for index in 0..MAX_ATTEMPTS {
            let detail = if index == 0 { Detail::High } else { Detail::Low };
            if index > 0 {
                if let Some(current) = image.as_deref() {
                    warn!("Retry {index}: shrinking image");
                    image = Some(degrade(current));
                }
            }
            image = image.map(|data| datauri::ensure_jpeg(&data));

            let attempt = Attempt { index, detail, image: image.as_deref() };
            match self.attempt(request, &attempt).await {
                Ok(Some(url)) => {
                    info!("Generation succeeded: {}", preview(&url, 50));
                    return GenerationResult::succeeded(url);
                }
                Ok(None) => warn!("Attempt {} returned no image URL", index + 1),
                Err(DrawError::Timeout { .. }) => error!("Attempt {} timed out", index + 1),
                Err(e) => error!("Attempt {} failed: {e}", index + 1),
            }

            if index + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }

        GenerationResult::failed(RETRIES_EXHAUSTED)
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        attempt: &Attempt<'_>,
    ) -> Result<Option<String>, DrawError> {
        let mut content = vec![json!({"type": "text", "text": request.prompt})];
        if let Some(image) = attempt.image {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": image, "detail": attempt.detail.as_str()}
            }));
        }
        let body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": content}],
            "stream": true
        });

        let size_info = attempt
            .image
            .map(|i| format!(" | image {:.2} KB", i.len() as f64 / 1024.0))
            .unwrap_or_default();
        info!("Sending generation request (attempt {}){size_info}", attempt.index + 1);

        let mut http_request = HttpRequest::post_json(&self.api_url, body);
        if let Some(ref key) = self.api_key {
            http_request = http_request.with_bearer(key);
        }
        let reply = send_with_timeout(self.http.as_ref(), &http_request, GENERATION_TIMEOUT).await?;

        if !reply.is_ok() {
            let message = preview(&reply.body_text(), 100);
            warn!("Generation API error ({}): {message}", reply.status);
            return Err(DrawError::Api { status: reply.status, message });
        }

        Ok(extract_result_url(&collect_stream_text(&reply.body_text())))
    }
}
