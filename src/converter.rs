//! URL-to-data-URI conversion through a third-party HTTP service.
//!
//! The service's response format is loose, so payload extraction runs an
//! ordered chain of parsers over the raw body: a regex over the text first,
//! then strict JSON. When every parser misses, the caller gets a diagnostic
//! block meant to be shown to the user verbatim.

use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tracing::{error, info, warn};

use crate::datauri;
use crate::error::DrawError;
use crate::output::preview;
use crate::ports::http::{send_with_timeout, HttpClient, HttpRequest};

/// Time budget for one conversion call.
pub const CONVERT_TIMEOUT: Duration = Duration::from_secs(30);

/// Payloads shorter than this are logged as suspect (but still returned).
const SUSPECT_PAYLOAD_LEN: usize = 100;

/// Rule that opens every diagnostic block.
pub const DIAGNOSTIC_RULE: &str = "==============";

static BASE64_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""base64"\s*:\s*"([^"]+)""#).expect("valid base64 field regex"));

/// How an attempt to obtain an upload-ready image ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// A `data:image/jpeg;base64,` URI ready for upload.
    Ready(String),
    /// A short human-readable failure.
    Failed(String),
    /// A multi-line diagnostic block for the user.
    Diagnostic(String),
    /// Conversion is administratively disabled.
    Unavailable,
}

/// A single payload extraction strategy.
type PayloadParser = fn(&str) -> Option<String>;

/// Extraction strategies, in precedence order.
const PARSERS: &[(&str, PayloadParser)] = &[
    ("base64 field (regex)", regex_base64_field),
    ("base64 field (json)", json_base64_field),
    ("data field (json)", json_data_field),
];

/// Escaped slashes (`\/`) are unescaped; base64 never contains a backslash.
fn regex_base64_field(body: &str) -> Option<String> {
    BASE64_FIELD.captures(body).map(|c| c[1].replace("\\/", "/"))
}

fn json_string_field(body: &str, field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get(field)?.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn json_base64_field(body: &str) -> Option<String> {
    json_string_field(body, "base64")
}

fn json_data_field(body: &str) -> Option<String> {
    json_string_field(body, "data")
}

/// Run the parser chain; returns the winning strategy's name and the payload
/// with known data-URI prefixes removed.
#[must_use]
pub fn extract_payload(body: &str) -> Option<(&'static str, String)> {
    PARSERS
        .iter()
        .find_map(|(name, parse)| parse(body).map(|p| (*name, datauri::strip_known_prefixes(&p))))
}

/// Builds the diagnostic text shown to users when conversion fails.
struct Diagnostic {
    text: String,
}

impl Diagnostic {
    fn new(title: &str) -> Self {
        Self { text: format!("{DIAGNOSTIC_RULE} {title} {DIAGNOSTIC_RULE}\n") }
    }

    fn field(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        let _ = writeln!(self.text, "{name}: {value}");
        self
    }

    fn section(mut self, body: &str) -> Self {
        let _ = write!(self.text, "\n{body}\n");
        self
    }

    fn finish(self) -> ImageOutcome {
        ImageOutcome::Diagnostic(self.text)
    }
}

/// Converts image URLs to data-URIs through the configured service.
pub struct UrlConverter {
    http: Arc<dyn HttpClient>,
    endpoint: String,
    enabled: bool,
}

impl UrlConverter {
    /// Create a converter for `endpoint`.
    pub fn new(http: Arc<dyn HttpClient>, endpoint: impl Into<String>, enabled: bool) -> Self {
        Self { http, endpoint: endpoint.into(), enabled }
    }

    /// Whether the conversion service may be called.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convert `image_url` into a JPEG data-URI.
    ///
    /// Never fails outright: problems come back as [`ImageOutcome::Diagnostic`],
    /// or [`ImageOutcome::Unavailable`] when conversion is disabled.
    pub async fn convert(&self, image_url: &str) -> ImageOutcome {
        if !self.enabled {
            error!("Conversion API is disabled; cannot convert external image");
            return ImageOutcome::Unavailable;
        }

        info!("Converting image URL via API: {}", preview(image_url, 100));
        let request = HttpRequest::get(&self.endpoint).with_query("url", image_url);

        let reply = match send_with_timeout(self.http.as_ref(), &request, CONVERT_TIMEOUT).await {
            Ok(reply) => reply,
            Err(DrawError::Timeout { seconds }) => {
                error!("Conversion API timed out");
                return Diagnostic::new("Conversion API timed out")
                    .field("URL", image_url)
                    .field("Endpoint", &self.endpoint)
                    .field("Timeout", format!("{seconds}s"))
                    .section("Request timed out; check the network or the conversion service.")
                    .finish();
            }
            Err(e) => {
                error!("Conversion failed: {e}");
                return Diagnostic::new("Conversion error")
                    .field("URL", image_url)
                    .field("Endpoint", &self.endpoint)
                    .section(&format!("Error: {e}"))
                    .finish();
            }
        };

        let body = reply.body_text();
        let body = body.trim();
        info!("Conversion API status: {}", reply.status);
        info!("Conversion API preview: {}", preview(body, 200));

        if !reply.is_ok() {
            error!("Conversion API request failed: {}", reply.status);
            return Diagnostic::new("Conversion API request failed")
                .field("URL", image_url)
                .field("Status", reply.status)
                .field("Endpoint", &self.endpoint)
                .section(&format!("Error response:\n{}", preview(body, 500)))
                .finish();
        }

        match extract_payload(body) {
            Some((strategy, payload)) => {
                if payload.len() < SUSPECT_PAYLOAD_LEN {
                    // Suspect, but passed through unchanged.
                    warn!("Extracted base64 is suspiciously short ({} chars)", payload.len());
                } else {
                    info!("Extracted base64 via {strategy}, {} chars", payload.len());
                }
                ImageOutcome::Ready(datauri::wrap_jpeg(&payload))
            }
            None => Diagnostic::new("Conversion API response (debug)")
                .field("URL", image_url)
                .field("Status", reply.status)
                .field("Endpoint", &self.endpoint)
                .section(&format!(
                    "Could not extract base64 data.\n\nRaw response:\n{}",
                    preview(body, 1000)
                ))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::http::Method;
    use crate::testing::{ScriptedHttp, Step};

    const ENDPOINT: &str = "https://convert.example/api/";

    fn converter(http: Arc<ScriptedHttp>, enabled: bool) -> UrlConverter {
        UrlConverter::new(http, ENDPOINT, enabled)
    }

    #[test]
    fn regex_wins_over_json() {
        let body = r#"{"data":"DDDD","base64":"AAAA"}"#;
        assert_eq!(extract_payload(body), Some(("base64 field (regex)", "AAAA".into())));
    }

    #[test]
    fn regex_tolerates_broken_json() {
        let body = r#"{"code":200, "base64" : "QUJD", oops"#;
        assert_eq!(extract_payload(body).unwrap().1, "QUJD");
    }

    #[test]
    fn json_data_field_is_last_resort() {
        let body = r#"{"code":200,"data":"data:image/png;base64,QUJD"}"#;
        assert_eq!(extract_payload(body), Some(("data field (json)", "QUJD".into())));
    }

    #[test]
    fn empty_fields_do_not_match() {
        assert_eq!(extract_payload(r#"{"base64":"","data":""}"#), None);
        assert_eq!(extract_payload("<html>oops</html>"), None);
    }

    #[test]
    fn escaped_slashes_are_unescaped() {
        let body = r#"{"code":200,"base64":"ab\/cd+\/ef=="}"#;
        assert_eq!(extract_payload(body), Some(("base64 field (regex)", "ab/cd+/ef==".into())));
    }

    #[test]
    fn prefixed_payload_is_stripped() {
        let body = r#"{"base64":"data:image/webp;base64,QUJD"}"#;
        assert_eq!(extract_payload(body).unwrap().1, "QUJD");
    }

    #[tokio::test]
    async fn base64_body_becomes_jpeg_data_uri() {
        let http = ScriptedHttp::new(vec![Step::text(200, r#"{"base64":"AAAA"}"#)]);
        let outcome = converter(http.clone(), true).convert("https://img/cat.png").await;
        assert_eq!(outcome, ImageOutcome::Ready("data:image/jpeg;base64,AAAA".into()));

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, ENDPOINT);
        assert_eq!(requests[0].query, vec![("url".into(), "https://img/cat.png".into())]);
    }

    #[tokio::test]
    async fn non_200_yields_diagnostic_with_status_and_url() {
        let http = ScriptedHttp::new(vec![Step::text(502, "bad gateway")]);
        let outcome = converter(http, true).convert("https://img/cat.png").await;
        let ImageOutcome::Diagnostic(text) = outcome else { panic!("expected diagnostic") };
        assert!(text.starts_with(DIAGNOSTIC_RULE));
        assert!(text.contains("502"));
        assert!(text.contains("https://img/cat.png"));
        assert!(text.contains(ENDPOINT));
        assert!(text.contains("bad gateway"));
    }

    #[tokio::test]
    async fn unparseable_body_yields_diagnostic_with_preview() {
        let body = "x".repeat(1500);
        let http = ScriptedHttp::new(vec![Step::text(200, &body)]);
        let ImageOutcome::Diagnostic(text) = converter(http, true).convert("https://img/a").await
        else {
            panic!("expected diagnostic")
        };
        assert!(text.contains("Could not extract base64 data"));
        assert!(text.contains(&format!("{}...", "x".repeat(1000))));
        assert!(!text.contains(&"x".repeat(1001)));
    }

    #[tokio::test]
    async fn transport_error_yields_diagnostic() {
        let http = ScriptedHttp::new(vec![Step::Fail("connection refused")]);
        let ImageOutcome::Diagnostic(text) = converter(http, true).convert("https://img/a").await
        else {
            panic!("expected diagnostic")
        };
        assert!(text.contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_diagnostic_after_thirty_seconds() {
        let http = ScriptedHttp::new(vec![Step::Hang]);
        let start = tokio::time::Instant::now();
        let ImageOutcome::Diagnostic(text) = converter(http, true).convert("https://img/a").await
        else {
            panic!("expected diagnostic")
        };
        let elapsed = start.elapsed();
        assert!(elapsed >= CONVERT_TIMEOUT && elapsed < CONVERT_TIMEOUT + Duration::from_secs(1));
        assert!(text.contains("timed out"));
        assert!(text.contains("30s"));
    }

    #[tokio::test]
    async fn disabled_converter_makes_no_request() {
        let http = ScriptedHttp::new(vec![]);
        let outcome = converter(http.clone(), false).convert("https://img/a").await;
        assert_eq!(outcome, ImageOutcome::Unavailable);
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn short_payload_is_still_returned() {
        let http = ScriptedHttp::new(vec![Step::text(200, r#"{"base64":"QQ=="}"#)]);
        let outcome = converter(http, true).convert("https://img/a").await;
        assert_eq!(outcome, ImageOutcome::Ready("data:image/jpeg;base64,QQ==".into()));
    }
}
