//! Raster image strategies: recode between formats and wrap in a PDF page.

use super::pdfgen;
use crate::classify::TargetFormat;
use crate::error::StrategyError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Decode `bytes` (format guessed from content) into a `DynamicImage`.
///
/// Every decode failure, truncated data included, is reported as malformed input.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, StrategyError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| StrategyError::MalformedInput(format!("Image could not be decoded: {e}")))?;
    debug!("Decoded image {}x{}", img.width(), img.height());
    Ok(img)
}

/// Encode an image to a raster target.
///
/// JPEG uses `quality` and drops alpha. WEBP uses the lossless encoder.
pub fn encode(
    img: &DynamicImage,
    target: TargetFormat,
    quality: u8,
) -> Result<Vec<u8>, StrategyError> {
    let mut buf = Vec::new();
    match target {
        TargetFormat::Jpg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
        }
        TargetFormat::Webp => {
            let rgba = img.to_rgba8();
            WebPEncoder::new_lossless(&mut buf).encode(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ExtendedColorType::Rgba8,
            )?;
        }
        other => {
            let format = other.image_format().ok_or_else(|| {
                StrategyError::Capability(format!("{other} is not a raster image format"))
            })?;
            img.write_to(&mut Cursor::new(&mut buf), format)?;
        }
    }
    Ok(buf)
}

/// Decode and re-encode.
pub fn recode(bytes: &[u8], target: TargetFormat, quality: u8) -> Result<Vec<u8>, StrategyError> {
    if !target.is_image() {
        return Err(StrategyError::Capability(format!(
            "{target} is not a raster image format"
        )));
    }
    let img = decode(bytes)?;
    encode(&img, target, quality)
}

/// Embed the image as the single page of a new PDF.
pub fn to_pdf(bytes: &[u8], title: &str) -> Result<Vec<u8>, StrategyError> {
    let img = decode(bytes)?;
    Ok(pdfgen::image_to_pdf(title, &img))
}
