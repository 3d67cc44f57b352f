//! Chat replies and the text helpers used to format them.

use std::time::Duration;

/// One message sent back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text.
    Text(String),
    /// An image referenced by URL.
    Image(String),
}

impl Reply {
    /// Text reply from anything string-like.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Render for a line-oriented terminal host.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image(url) => format!("[image] {url}"),
        }
    }
}

/// Destination for replies, delivered as soon as they are produced.
pub trait ReplySink: Send {
    /// Deliver one reply.
    fn send(&mut self, reply: Reply);
}

impl ReplySink for Vec<Reply> {
    fn send(&mut self, reply: Reply) {
        self.push(reply);
    }
}

/// Prints each reply to stdout, separated by blank lines.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReplySink for StdoutSink {
    fn send(&mut self, reply: Reply) {
        println!("{}\n", reply.render());
    }
}

/// The first `max_chars` characters of `s`, with `...` appended when cut.
#[must_use]
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Mask an API key for display: first and last four characters only.
#[must_use]
pub fn mask_key(key: Option<&str>) -> String {
    match key {
        Some(k) if k.chars().count() > 8 => {
            let head: String = k.chars().take(4).collect();
            let tail: String = k.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("{head}***{tail}")
        }
        _ => "not configured".to_string(),
    }
}

/// Seconds with two decimals, e.g. `"3.25s"`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
