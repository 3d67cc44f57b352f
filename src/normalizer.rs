//! Download-and-normalize path for remote images.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::converter::{ImageOutcome, UrlConverter};
use crate::datauri;
use crate::imaging;
use crate::output::preview;
use crate::ports::http::{send_with_timeout, HttpClient, HttpRequest};

/// Time budget for downloading the source image.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads images and re-encodes them locally, falling back to the
/// conversion service when local decoding fails.
pub struct ImageNormalizer {
    http: Arc<dyn HttpClient>,
    converter: UrlConverter,
}

impl ImageNormalizer {
    /// Create a normalizer that falls back to `converter`.
    pub fn new(http: Arc<dyn HttpClient>, converter: UrlConverter) -> Self {
        Self { http, converter }
    }

    /// The fallback converter.
    #[must_use]
    pub fn converter(&self) -> &UrlConverter {
        &self.converter
    }

    /// Turn `image_url` into an upload-ready JPEG data-URI.
    ///
    /// Inline data-URIs are returned unchanged. Download problems produce
    /// [`ImageOutcome::Failed`]; decode problems hand the original URL to the
    /// converter and return whatever it produces.
    pub async fn normalize(&self, image_url: &str) -> ImageOutcome {
        if datauri::is_inline_image(image_url) {
            return ImageOutcome::Ready(image_url.to_string());
        }

        info!("Downloading image: {}", preview(image_url, 50));
        let request = HttpRequest::get(image_url);
        let reply = match send_with_timeout(self.http.as_ref(), &request, FETCH_TIMEOUT).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Image download failed: {e}");
                return ImageOutcome::Failed(format!("Download error: {e}"));
            }
        };

        if !reply.is_ok() {
            return ImageOutcome::Failed(format!("Download failed: {}", reply.status));
        }

        match imaging::prepare_upload(&reply.body) {
            Ok(data_uri) => {
                info!(
                    "Image normalized: {} bytes -> {} base64 chars",
                    reply.body.len(),
                    datauri::payload(&data_uri).len()
                );
                ImageOutcome::Ready(data_uri)
            }
            Err(e) => {
                error!("Local image processing failed: {e}; falling back to conversion API");
                self.converter.convert(image_url).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;

    use super::*;
    use crate::imaging::tests::{decode_data_uri, png_bytes, two_frame_gif};
    use crate::ports::http::Method;
    use crate::testing::{ScriptedHttp, Step};

    fn normalizer(http: &Arc<ScriptedHttp>, convert_enabled: bool) -> ImageNormalizer {
        let converter = UrlConverter::new(http.clone(), "https://convert/", convert_enabled);
        ImageNormalizer::new(http.clone(), converter)
    }

    #[tokio::test]
    async fn data_uri_is_returned_unchanged() {
        let http = ScriptedHttp::new(vec![]);
        let uri = "data:image/png;base64,iVBORw0KGgo=";
        assert_eq!(normalizer(&http, true).normalize(uri).await, ImageOutcome::Ready(uri.into()));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn small_png_is_reencoded_as_jpeg() {
        let http = ScriptedHttp::new(vec![Step::bytes(200, png_bytes(200, 100))]);
        let ImageOutcome::Ready(uri) = normalizer(&http, true).normalize("https://img/a.png").await
        else {
            panic!("expected ready")
        };
        assert_eq!(decode_data_uri(&uri).dimensions(), (200, 100));
        assert_eq!(http.requests()[0].url, "https://img/a.png");
    }

    #[tokio::test]
    async fn oversized_image_is_bounded() {
        let http = ScriptedHttp::new(vec![Step::bytes(200, png_bytes(3000, 1500))]);
        let ImageOutcome::Ready(uri) = normalizer(&http, true).normalize("https://img/big").await
        else {
            panic!("expected ready")
        };
        let (w, h) = decode_data_uri(&uri).dimensions();
        assert_eq!(w.max(h), 1536);
        assert_eq!((w, h), (1536, 768));
    }

    #[tokio::test]
    async fn animated_gif_uses_first_frame() {
        let http = ScriptedHttp::new(vec![Step::bytes(200, two_frame_gif())]);
        let ImageOutcome::Ready(uri) = normalizer(&http, true).normalize("https://img/anim.gif").await
        else {
            panic!("expected ready")
        };
        let pixel = decode_data_uri(&uri).to_rgb8().get_pixel(16, 16).0;
        assert!(pixel[0] > 200 && pixel[2] < 60, "expected red, got {pixel:?}");
    }

    #[tokio::test]
    async fn non_200_download_fails_with_status() {
        let http = ScriptedHttp::new(vec![Step::text(404, "gone")]);
        let outcome = normalizer(&http, true).normalize("https://img/missing").await;
        assert_eq!(outcome, ImageOutcome::Failed("Download failed: 404".into()));
        assert_eq!(http.count(Method::Get), 1);
    }

    #[tokio::test]
    async fn undecodable_bytes_fall_back_to_converter() {
        let http = ScriptedHttp::new(vec![
            Step::text(200, "<html>not an image</html>"),
            Step::text(200, r#"{"base64":"AAAA"}"#),
        ]);
        let outcome = normalizer(&http, true).normalize("https://img/page").await;
        assert_eq!(outcome, ImageOutcome::Ready("data:image/jpeg;base64,AAAA".into()));

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "https://convert/");
        assert_eq!(requests[1].query[0].1, "https://img/page");
    }

    #[tokio::test]
    async fn fallback_respects_disabled_converter() {
        let http = ScriptedHttp::new(vec![Step::text(200, "not an image")]);
        let outcome = normalizer(&http, false).normalize("https://img/page").await;
        assert_eq!(outcome, ImageOutcome::Unavailable);
        assert_eq!(http.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn download_timeout_is_a_failure() {
        let http = ScriptedHttp::new(vec![Step::Hang]);
        let ImageOutcome::Failed(message) = normalizer(&http, true).normalize("https://slow").await
        else {
            panic!("expected failure")
        };
        assert!(message.contains("timed out after 30s"));
    }
}
