//! Data-URI helpers.
//!
//! Every image handed to the generation API is tagged `image/jpeg`, whatever
//! format the payload was produced from.

/// Prefix shared by every inline image data-URI.
pub const INLINE_IMAGE_PREFIX: &str = "data:image/";

/// Canonical prefix used for every payload sent upstream.
pub const JPEG_PREFIX: &str = "data:image/jpeg;base64,";

/// Prefixes stripped from converter payloads before re-tagging.
const KNOWN_PREFIXES: &[&str] = &[
    "data:image/jpeg;base64,",
    "data:image/png;base64,",
    "data:image/webp;base64,",
    "data:image/gif;base64,",
];

/// Whether the string is already an inline image data-URI.
#[must_use]
pub fn is_inline_image(s: &str) -> bool {
    s.starts_with(INLINE_IMAGE_PREFIX)
}

/// Wrap a raw base64 payload as a JPEG data-URI.
#[must_use]
pub fn wrap_jpeg(payload: &str) -> String {
    format!("{JPEG_PREFIX}{payload}")
}

/// Remove every known image data-URI prefix from a payload.
#[must_use]
pub fn strip_known_prefixes(payload: &str) -> String {
    KNOWN_PREFIXES.iter().fold(payload.to_string(), |acc, prefix| acc.replace(prefix, ""))
}

/// The base64 payload of a data-URI, or the whole input when it has no
/// `base64,` marker.
#[must_use]
pub fn payload(data_uri: &str) -> &str {
    data_uri.split_once("base64,").map_or(data_uri, |(_, data)| data)
}

/// Re-tag any payload (bare base64 or a data-URI of any image type) as
/// `data:image/jpeg;base64,`.
#[must_use]
pub fn ensure_jpeg(data: &str) -> String {
    if data.starts_with(JPEG_PREFIX) {
        return data.to_string();
    }
    wrap_jpeg(payload(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_bare_payload() {
        assert_eq!(ensure_jpeg("AAAA"), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn retags_png_data_uri() {
        assert_eq!(ensure_jpeg("data:image/png;base64,AAAA"), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn jpeg_data_uri_unchanged() {
        let uri = "data:image/jpeg;base64,/9j/4AAQ";
        assert_eq!(ensure_jpeg(uri), uri);
    }

    #[test]
    fn strips_every_known_prefix() {
        assert_eq!(strip_known_prefixes("data:image/webp;base64,QUJD"), "QUJD");
        assert_eq!(strip_known_prefixes("data:image/gif;base64,QUJD"), "QUJD");
        assert_eq!(strip_known_prefixes("QUJD"), "QUJD");
    }

    #[test]
    fn payload_of_bare_string_is_itself() {
        assert_eq!(payload("QUJD"), "QUJD");
        assert_eq!(payload("data:image/jpeg;base64,QUJD"), "QUJD");
    }

    #[test]
    fn inline_detection() {
        assert!(is_inline_image("data:image/png;base64,AAAA"));
        assert!(!is_inline_image("https://example.com/a.png"));
    }
}
