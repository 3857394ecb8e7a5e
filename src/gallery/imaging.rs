//! Image inspection and upload-time resizing.
//!
//! Uploaded files are identified by their magic bytes, never by the declared
//! content type or the file extension. When an upload resize is configured the
//! image is decoded, resized to fill the target box and re-encoded in its
//! source format.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};

// =============================================================================
// Resize target
// =============================================================================

/// Target box for upload-time resizing, parsed from `WxH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeTarget {
    pub width: u32,
    pub height: u32,
}

impl FromStr for ResizeTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (w, h) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;

        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid width '{}'", w))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid height '{}'", h))?;

        if width == 0 || height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }

        Ok(Self { width, height })
    }
}

impl fmt::Display for ResizeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// =============================================================================
// Format detection
// =============================================================================

/// An uploaded file identified as an image we accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedImage {
    pub format: ImageFormat,
}

impl DetectedImage {
    /// MIME type stored with the object.
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Identify `data` as a PNG, JPEG or WebP image.
pub fn detect_image(data: &[u8]) -> Result<DetectedImage, String> {
    if data.is_empty() {
        return Err("file is empty".to_string());
    }

    let format = image::guess_format(data).map_err(|_| "not an image".to_string())?;

    match format {
        ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP => Ok(DetectedImage { format }),
        other => Err(format!("format {:?} is not accepted", other)),
    }
}

// =============================================================================
// Resizing
// =============================================================================

/// Resize an image to fill `target`, cropping the overflow, and re-encode it
/// in the same format.
pub fn resize_to_fill(
    data: &[u8],
    detected: DetectedImage,
    target: ResizeTarget,
) -> Result<Bytes, String> {
    let img = ImageReader::with_format(Cursor::new(data), detected.format)
        .decode()
        .map_err(|e| format!("decode failed: {}", e))?;

    if img.width() == target.width && img.height() == target.height {
        return Ok(Bytes::copy_from_slice(data));
    }

    let resized = img.resize_to_fill(target.width, target.height, FilterType::Triangle);

    // JPEG has no alpha channel
    let resized = if detected.format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(resized.to_rgb8())
    } else {
        resized
    };

    let mut output = Cursor::new(Vec::new());
    resized
        .write_to(&mut output, detected.format)
        .map_err(|e| format!("encode failed: {}", e))?;

    Ok(Bytes::from(output.into_inner()))
}
