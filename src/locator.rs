//! Finds the image a chat command should work on.
//!
//! Matchers run in a fixed order and the first hit wins: an image attached to
//! the message, then an image inside the quoted message, then the avatar of a
//! mentioned user.

use tracing::{debug, info};

use crate::datauri;
use crate::message::{ChatMessage, Segment};
use crate::output::preview;

/// Where the image for a command comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Already a `data:image/jpeg;base64,` URI.
    Inline(String),
    /// A URL that still has to be fetched.
    Remote(String),
}

/// Avatar URL for a mentioned user.
#[must_use]
pub fn avatar_url(user_id: &str) -> String {
    format!("https://q.qlogo.cn/g?b=qq&nk={user_id}&s=640")
}

/// One tier of the image search.
pub trait ImageMatcher: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Extract a candidate from the message's top-level segments.
    fn extract(&self, segments: &[Segment]) -> Option<ImageReference>;
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// URL preferred over inline data; empty fields count as absent.
fn image_in(segments: &[Segment]) -> Option<ImageReference> {
    segments.iter().find_map(|segment| match segment {
        Segment::Image { url, base64 } => non_empty(url.as_ref())
            .map(|u| ImageReference::Remote(u.to_string()))
            .or_else(|| {
                non_empty(base64.as_ref()).map(|b| ImageReference::Inline(datauri::wrap_jpeg(b)))
            }),
        _ => None,
    })
}

/// An image attached directly to the message.
pub struct DirectImage;

impl ImageMatcher for DirectImage {
    fn name(&self) -> &'static str {
        "direct image"
    }

    fn extract(&self, segments: &[Segment]) -> Option<ImageReference> {
        image_in(segments)
    }
}

/// An image inside the quoted (replied-to) message.
pub struct QuotedImage;

impl ImageMatcher for QuotedImage {
    fn name(&self) -> &'static str {
        "quoted image"
    }

    fn extract(&self, segments: &[Segment]) -> Option<ImageReference> {
        segments.iter().find_map(|segment| match segment {
            Segment::Reply { chain } => image_in(chain),
            _ => None,
        })
    }
}

/// The avatar of the first mentioned user.
pub struct MentionAvatar;

impl ImageMatcher for MentionAvatar {
    fn name(&self) -> &'static str {
        "mention avatar"
    }

    fn extract(&self, segments: &[Segment]) -> Option<ImageReference> {
        segments.iter().find_map(|segment| match segment {
            Segment::Mention { user_id } => Some(ImageReference::Remote(avatar_url(user_id))),
            _ => None,
        })
    }
}

/// Runs matchers in order; the first candidate wins.
pub struct ImageLocator {
    matchers: Vec<Box<dyn ImageMatcher>>,
}

impl Default for ImageLocator {
    fn default() -> Self {
        Self::new(vec![Box::new(DirectImage), Box::new(QuotedImage), Box::new(MentionAvatar)])
    }
}

impl ImageLocator {
    /// A locator with a custom matcher order.
    #[must_use]
    pub fn new(matchers: Vec<Box<dyn ImageMatcher>>) -> Self {
        Self { matchers }
    }

    /// Find the image for `message`, if any.
    #[must_use]
    pub fn locate(&self, message: &ChatMessage) -> Option<ImageReference> {
        for matcher in &self.matchers {
            if let Some(found) = matcher.extract(&message.segments) {
                match &found {
                    ImageReference::Remote(url) => {
                        info!("Found {}: {}", matcher.name(), preview(url, 100));
                    }
                    ImageReference::Inline(uri) => {
                        info!("Found {} (inline, {} chars)", matcher.name(), uri.len());
                    }
                }
                return Some(found);
            }
        }
        debug!("No image found in message");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locate(segments: Vec<Segment>) -> Option<ImageReference> {
        ImageLocator::default().locate(&ChatMessage::new(segments))
    }

    #[test]
    fn direct_url_is_remote() {
        let found = locate(vec![Segment::plain("/remix"), Segment::image_url("https://a/b.png")]);
        assert_eq!(found, Some(ImageReference::Remote("https://a/b.png".into())));
    }

    #[test]
    fn direct_base64_is_wrapped_inline() {
        let found = locate(vec![Segment::image_base64("QUJD")]);
        assert_eq!(found, Some(ImageReference::Inline("data:image/jpeg;base64,QUJD".into())));
    }

    #[test]
    fn url_preferred_over_base64() {
        let found = locate(vec![Segment::Image {
            url: Some("https://a/b.png".into()),
            base64: Some("QUJD".into()),
        }]);
        assert_eq!(found, Some(ImageReference::Remote("https://a/b.png".into())));
    }

    #[test]
    fn empty_url_falls_through_to_base64() {
        let found =
            locate(vec![Segment::Image { url: Some(String::new()), base64: Some("QUJD".into()) }]);
        assert_eq!(found, Some(ImageReference::Inline("data:image/jpeg;base64,QUJD".into())));
    }

    #[test]
    fn quoted_image_url_is_found() {
        let found = locate(vec![
            Segment::Reply { chain: vec![Segment::plain("look"), Segment::image_url("https://q/i.png")] },
            Segment::plain("/remix make it blue"),
        ]);
        assert_eq!(found, Some(ImageReference::Remote("https://q/i.png".into())));
    }

    #[test]
    fn direct_image_beats_quoted_and_mention() {
        let found = locate(vec![
            Segment::Mention { user_id: "1".into() },
            Segment::Reply { chain: vec![Segment::image_url("https://q/i.png")] },
            Segment::image_url("https://direct/i.png"),
        ]);
        assert_eq!(found, Some(ImageReference::Remote("https://direct/i.png".into())));
    }

    #[test]
    fn quoted_beats_mention() {
        let found = locate(vec![
            Segment::Mention { user_id: "1".into() },
            Segment::Reply { chain: vec![Segment::image_base64("QUJD")] },
        ]);
        assert_eq!(found, Some(ImageReference::Inline("data:image/jpeg;base64,QUJD".into())));
    }

    #[test]
    fn mention_only_gives_avatar() {
        let found = locate(vec![Segment::plain("/remix"), Segment::Mention { user_id: "123456".into() }]);
        assert_eq!(
            found,
            Some(ImageReference::Remote("https://q.qlogo.cn/g?b=qq&nk=123456&s=640".into()))
        );
    }

    #[test]
    fn nested_quotes_are_not_searched() {
        let found = locate(vec![Segment::Reply {
            chain: vec![Segment::Reply { chain: vec![Segment::image_url("https://deep/i.png")] }],
        }]);
        assert_eq!(found, None);
    }

    #[test]
    fn nothing_found() {
        assert_eq!(locate(vec![Segment::plain("/remix a cat")]), None);
    }
}
