//! Pure image operations: first-frame decode, bounding, shrinking, JPEG encode.

use std::io::Cursor;

use base64::Engine;
use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ExtendedColorType, GenericImageView, ImageFormat};

use crate::datauri;
use crate::error::DrawError;

/// Longest side allowed for images sent upstream.
pub const MAX_DIMENSION: u32 = 1536;

/// JPEG quality used when normalizing a downloaded image.
pub const NORMALIZE_QUALITY: u8 = 85;

/// Linear scale applied on each retry shrink.
pub const SHRINK_SCALE: f64 = 0.7;

/// JPEG quality used when shrinking between retries.
pub const SHRINK_QUALITY: u8 = 80;

/// Shrinking stops once either side would drop below this many pixels.
pub const MIN_DIMENSION: u32 = 128;

/// Decode image bytes, keeping only the first frame of animated images, and
/// flatten to 3-channel RGB.
///
/// # Errors
///
/// Returns an error if the format is unknown or the data cannot be decoded.
pub fn decode_first_frame(bytes: &[u8]) -> Result<DynamicImage, DrawError> {
    let format = image::guess_format(bytes)?;
    let img = if format == ImageFormat::Gif {
        let decoder = GifDecoder::new(Cursor::new(bytes))?;
        let frame = decoder
            .into_frames()
            .next()
            .ok_or_else(|| DrawError::ImageConversion("animation has no frames".into()))??;
        DynamicImage::ImageRgba8(frame.into_buffer())
    } else {
        image::load_from_memory_with_format(bytes, format)?
    };
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Downscale so that neither side exceeds `max`, preserving aspect ratio.
///
/// The longer side lands exactly on `max`; images already within bounds are
/// returned untouched.
#[must_use]
pub fn bound_dimensions(img: DynamicImage, max: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max && height <= max {
        return img;
    }

    let (new_width, new_height) = if width >= height {
        (max, scale_side(height, max, width))
    } else {
        (scale_side(width, max, height), max)
    };
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_side(side: u32, target: u32, reference: u32) -> u32 {
    let scaled = f64::from(side) * f64::from(target) / f64::from(reference);
    (scaled.round() as u32).max(1)
}

/// Encode as baseline JPEG at the given quality.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, DrawError> {
    let rgb = img.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buffer.into_inner())
}

/// Encode as JPEG and wrap as a `data:image/jpeg;base64,` URI.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn to_jpeg_data_uri(img: &DynamicImage, quality: u8) -> Result<String, DrawError> {
    let jpeg = encode_jpeg(img, quality)?;
    Ok(datauri::wrap_jpeg(&base64::engine::general_purpose::STANDARD.encode(jpeg)))
}

/// Turn downloaded bytes into an upload-ready data-URI: first frame, RGB,
/// bounded to [`MAX_DIMENSION`], JPEG at [`NORMALIZE_QUALITY`].
///
/// # Errors
///
/// Returns an error if the bytes cannot be decoded or re-encoded.
pub fn prepare_upload(bytes: &[u8]) -> Result<String, DrawError> {
    let img = decode_first_frame(bytes)?;
    let (width, height) = img.dimensions();
    let img = bound_dimensions(img, MAX_DIMENSION);
    if img.dimensions() != (width, height) {
        tracing::info!("Image downscaled {width}x{height} -> {}x{}", img.width(), img.height());
    }
    to_jpeg_data_uri(&img, NORMALIZE_QUALITY)
}

/// Result of a retry shrink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shrink {
    /// The image was resampled and re-encoded.
    Shrunk {
        /// The new JPEG data-URI.
        data_uri: String,
        /// Dimensions before shrinking.
        from: (u32, u32),
        /// Dimensions after shrinking.
        to: (u32, u32),
    },
    /// The shrunk image would fall below [`MIN_DIMENSION`]; keep the input.
    AtFloor {
        /// Current dimensions of the kept image.
        size: (u32, u32),
    },
}

/// Shrink a data-URI (or bare base64) image to `scale` of its linear size and
/// re-encode at `quality`.
///
/// # Errors
///
/// Returns an error if the payload is not valid base64 or not a decodable
/// image.
pub fn shrink_data_uri(data: &str, scale: f64, quality: u8) -> Result<Shrink, DrawError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(datauri::payload(data).trim())
        .map_err(|e| DrawError::ImageConversion(format!("invalid base64 payload: {e}")))?;
    let img = decode_first_frame(&bytes)?;
    let (width, height) = img.dimensions();
    let (new_width, new_height) = (scale_by(width, scale), scale_by(height, scale));

    if new_width < MIN_DIMENSION || new_height < MIN_DIMENSION {
        return Ok(Shrink::AtFloor { size: (width, height) });
    }

    let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);
    Ok(Shrink::Shrunk {
        data_uri: to_jpeg_data_uri(&resized, quality)?,
        from: (width, height),
        to: (new_width, new_height),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_by(side: u32, scale: f64) -> u32 {
    (f64::from(side) * scale).floor() as u32
}
