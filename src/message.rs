//! Incoming chat messages as ordered, typed segments.

use serde::{Deserialize, Serialize};

/// One typed piece of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Plain {
        /// The text.
        text: String,
    },
    /// An attached image, by URL and/or inline base64.
    Image {
        /// Fetchable URL.
        #[serde(default)]
        url: Option<String>,
        /// Inline base64 payload (no data-URI prefix).
        #[serde(default)]
        base64: Option<String>,
    },
    /// A quoted message this one replies to.
    Reply {
        /// Segments of the quoted message.
        #[serde(default)]
        chain: Vec<Segment>,
    },
    /// A mention of another user.
    Mention {
        /// The mentioned user's identifier.
        user_id: String,
    },
}

impl Segment {
    /// Plain text segment.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    /// Image segment with a URL.
    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image { url: Some(url.into()), base64: None }
    }

    /// Image segment with an inline base64 payload.
    pub fn image_base64(payload: impl Into<String>) -> Self {
        Self::Image { url: None, base64: Some(payload.into()) }
    }
}

/// A chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Segments in display order.
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl ChatMessage {
    /// A message with the given segments.
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// A text-only message.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(vec![Segment::plain(text)])
    }

    /// Parse one host input line: a JSON message if it parses as one,
    /// otherwise plain text.
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            if let Ok(message) = serde_json::from_str(trimmed) {
                return message;
            }
        }
        Self::text_only(trimmed)
    }

    /// Concatenated text of the top-level plain segments, trimmed.
    #[must_use]
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Plain { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<String>()
            .trim()
            .to_string()
    }
}
