//! CLI argument parsing with clap.

use std::path::PathBuf;

use clap::Parser;

use crate::error::DrawError;
use crate::message::{ChatMessage, Segment};

/// Chat-side image generation plugin, driven from the command line.
///
/// Without a message or `--event`, reads one message per stdin line.
#[derive(Parser, Debug)]
#[command(name = "gemini-draw", version, about)]
pub struct Cli {
    /// Chat message text, e.g. "/draw a cat".
    #[arg(conflicts_with = "event")]
    pub message: Option<String>,

    /// Attach an image by URL.
    #[arg(long)]
    pub image: Option<String>,

    /// Attach an inline image as a bare base64 payload.
    #[arg(long, conflicts_with = "image")]
    pub image_base64: Option<String>,

    /// Quote a message containing an image at this URL.
    #[arg(long)]
    pub quoted_image: Option<String>,

    /// Mention a user by id.
    #[arg(long)]
    pub mention: Option<String>,

    /// Read the message from a JSON file (`{"segments":[...]}`).
    #[arg(long)]
    pub event: Option<PathBuf>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the single message described by the arguments, if any.
    ///
    /// Returns `Ok(None)` when messages should be read from stdin instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the event file cannot be read or parsed.
    pub fn to_message(&self) -> Result<Option<ChatMessage>, DrawError> {
        if let Some(ref path) = self.event {
            let contents = std::fs::read_to_string(path)?;
            let message = serde_json::from_str(&contents).map_err(|e| {
                DrawError::InvalidArgument(format!("Invalid event file {}: {e}", path.display()))
            })?;
            return Ok(Some(message));
        }

        let Some(ref text) = self.message else {
            return Ok(None);
        };

        let mut segments = Vec::new();
        if let Some(ref url) = self.quoted_image {
            segments.push(Segment::Reply { chain: vec![Segment::image_url(url)] });
        }
        segments.push(Segment::plain(text));
        if let Some(ref url) = self.image {
            segments.push(Segment::image_url(url));
        }
        if let Some(ref payload) = self.image_base64 {
            segments.push(Segment::image_base64(payload));
        }
        if let Some(ref user_id) = self.mention {
            segments.push(Segment::Mention { user_id: user_id.clone() });
        }
        Ok(Some(ChatMessage::new(segments)))
    }
}
