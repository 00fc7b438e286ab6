//! Adaptive JPEG compression to a byte budget.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, trace};

use crate::domain::errors::{MediaError, MediaResult};

/// Default size budget for uploads (1 MiB).
pub const DEFAULT_TARGET_SIZE: usize = 1024 * 1024;

/// Default lowest quality the compressor will try.
pub const DEFAULT_MIN_QUALITY: f32 = 0.1;

/// Quality levels are whole tenths: 10 is 1.0, 1 is 0.1.
const MAX_QUALITY_TENTHS: u8 = 10;

/// Output of a compression pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    /// Encoded bytes, or the input untouched when it already fit.
    pub bytes: Bytes,
    quality_tenths: u8,
    reencoded: bool,
}

impl CompressionResult {
    /// Quality level that produced `bytes`, in `[0.0, 1.0]`.
    #[must_use]
    pub fn quality(&self) -> f32 {
        f32::from(self.quality_tenths) / 10.0
    }

    /// False when the input was returned unchanged.
    #[must_use]
    pub const fn reencoded(&self) -> bool {
        self.reencoded
    }
}

/// Re-encodes images as JPEG at decreasing quality until they fit a size budget.
#[derive(Debug, Clone, Copy)]
pub struct JpegCompressor {
    target_size: usize,
    min_quality_tenths: u8,
}

impl JpegCompressor {
    /// Creates a compressor for the given budget.
    /// `min_quality` is clamped to `[0.1, 1.0]` and rounded to tenths.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(target_size: usize, min_quality: f32) -> Self {
        let tenths = (min_quality.clamp(0.1, 1.0) * 10.0).round() as u8;
        Self {
            target_size,
            min_quality_tenths: tenths.clamp(1, MAX_QUALITY_TENTHS),
        }
    }

    /// Returns the size budget.
    #[must_use]
    pub const fn target_size(&self) -> usize {
        self.target_size
    }

    /// Returns the quality floor.
    #[must_use]
    pub fn min_quality(&self) -> f32 {
        f32::from(self.min_quality_tenths) / 10.0
    }

    /// Compresses `raw` to at most `target_size` bytes when achievable.
    ///
    /// Inputs already under budget come back byte-identical. Otherwise the image is
    /// decoded once and re-encoded at 1.0, 0.9, ... down to the quality floor; the first
    /// encoding that fits wins, else the smallest attempt is returned.
    ///
    /// # Errors
    /// Returns `Decode` if `raw` is not an image and `Encode` if the JPEG encoder fails.
    pub fn compress(&self, raw: &[u8]) -> MediaResult<CompressionResult> {
        if raw.len() < self.target_size {
            trace!(size = raw.len(), target = self.target_size, "Already under budget");
            return Ok(CompressionResult {
                bytes: Bytes::copy_from_slice(raw),
                quality_tenths: MAX_QUALITY_TENTHS,
                reencoded: false,
            });
        }

        let decoded =
            image::load_from_memory(raw).map_err(|e| MediaError::decode(e.to_string()))?;
        let rgb = decoded.to_rgb8();

        let mut smallest: Option<(Vec<u8>, u8)> = None;
        for tenths in (self.min_quality_tenths..=MAX_QUALITY_TENTHS).rev() {
            let encoded = encode_jpeg(&rgb, tenths)?;
            trace!(quality = tenths, size = encoded.len(), "Compression attempt");

            if encoded.len() <= self.target_size {
                debug!(
                    original = raw.len(),
                    compressed = encoded.len(),
                    quality = f32::from(tenths) / 10.0,
                    "Image fits size budget"
                );
                return Ok(CompressionResult {
                    bytes: Bytes::from(encoded),
                    quality_tenths: tenths,
                    reencoded: true,
                });
            }

            if smallest.as_ref().is_none_or(|(best, _)| encoded.len() < best.len()) {
                smallest = Some((encoded, tenths));
            }
        }

        let (bytes, quality_tenths) =
            smallest.ok_or_else(|| MediaError::encode("no quality level attempted"))?;
        debug!(
            original = raw.len(),
            compressed = bytes.len(),
            target = self.target_size,
            "Size budget not reachable, returning smallest attempt"
        );
        Ok(CompressionResult {
            bytes: Bytes::from(bytes),
            quality_tenths,
            reencoded: true,
        })
    }
}

impl Default for JpegCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_SIZE, DEFAULT_MIN_QUALITY)
    }
}

/// Encodes at `tenths / 10` quality.
fn encode_jpeg(rgb: &image::RgbImage, tenths: u8) -> MediaResult<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, tenths * 10)
        .encode_image(rgb)
        .map_err(|e| MediaError::encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Deterministic noise, which JPEG cannot shrink much at high quality.
    fn noise(width: u32, height: u32) -> image::RgbImage {
        let mut state: u32 = 0x1234_5678;
        image::RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state.to_le_bytes()[0]
            };
            image::Rgb([next(), next(), next()])
        })
    }

    fn png_bytes(img: &image::RgbImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_small_input_is_returned_unchanged() {
        let raw = b"definitely not an image".to_vec();
        let compressor = JpegCompressor::new(1024, 0.1);

        let result = compressor.compress(&raw).unwrap();

        assert_eq!(result.bytes.as_ref(), raw.as_slice());
        assert!(!result.reencoded());
    }

    #[test]
    fn test_invalid_image_over_budget_fails_decode() {
        let raw = vec![0xAB; 4096];
        let compressor = JpegCompressor::new(1024, 0.1);

        let err = compressor.compress(&raw).unwrap_err();

        assert!(matches!(err, MediaError::Decode { .. }));
    }

    #[test]
    fn test_stops_at_first_quality_that_fits() {
        let img = noise(128, 128);
        let raw = png_bytes(&img);
        let target = encode_jpeg(&img, 5).unwrap().len();
        assert!(raw.len() >= target);

        let result = JpegCompressor::new(target, 0.1).compress(&raw).unwrap();

        assert!(result.reencoded());
        assert!(result.bytes.len() <= target);
        assert!(result.quality() >= 0.5 - f32::EPSILON);
    }

    #[test]
    fn test_unreachable_budget_returns_floor_attempt() {
        let img = noise(64, 64);
        let raw = png_bytes(&img);
        let floor = encode_jpeg(&img, 1).unwrap();

        let result = JpegCompressor::new(16, 0.1).compress(&raw).unwrap();

        assert!(result.bytes.len() <= floor.len());
        assert!(result.bytes.len() > 16);
        assert!(result.quality() <= 0.1 + f32::EPSILON);
    }

    #[test]
    fn test_quality_floor_is_respected() {
        let img = noise(64, 64);
        let raw = png_bytes(&img);

        let result = JpegCompressor::new(16, 0.5).compress(&raw).unwrap();

        assert!(result.quality() >= 0.5 - f32::EPSILON);
    }

    #[test]
    fn test_output_decodes_as_jpeg() {
        let img = noise(32, 32);
        let raw = png_bytes(&img);

        let result = JpegCompressor::new(raw.len(), 0.1).compress(&raw).unwrap();
        let format = image::guess_format(&result.bytes).unwrap();

        assert_eq!(format, image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_min_quality_is_clamped() {
        assert!((JpegCompressor::new(1, 0.0).min_quality() - 0.1).abs() < f32::EPSILON);
        assert!((JpegCompressor::new(1, 3.0).min_quality() - 1.0).abs() < f32::EPSILON);
    }
}
