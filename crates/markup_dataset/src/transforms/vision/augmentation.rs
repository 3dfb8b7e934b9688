//! Random pixel-level augmentations for the train pipeline.
//!
//! Every draw goes through [`crate::rng`], so a seeded dataset replays the same augmentations
//! for the same pass. None of these change image dimensions.

use crate::rng::{gen_bool, gen_range_inclusive, with_pass_rng};
use crate::transforms::Transform;
use anyhow::{anyhow, ensure, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use rand::Rng;
use rand_distr::{Distribution, Normal};

fn check_probability(p: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&p),
        "Probability must be in [0.0, 1.0] range (got {})",
        p
    );
    Ok(())
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Applies `f` to the RGB8 view of `img`, converting first if needed.
fn map_rgb(img: DynamicImage, f: impl FnOnce(&mut RgbImage)) -> DynamicImage {
    let mut rgb = match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    };
    f(&mut rgb);
    DynamicImage::ImageRgb8(rgb)
}

// ============================================================================
// RandomInvert
// ============================================================================

/// Inverts the image with probability `p`, turning dark-on-light renders into light-on-dark.
#[derive(Debug, Clone)]
pub struct RandomInvert {
    p: f64,
}

impl RandomInvert {
    pub fn new(p: f64) -> Result<Self> {
        check_probability(p)?;
        Ok(Self { p })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomInvert {
    fn apply(&self, mut img: DynamicImage) -> Result<DynamicImage> {
        if gen_bool(self.p) {
            img.invert();
        }
        Ok(img)
    }
}

// ============================================================================
// RandomRgbShift
// ============================================================================

/// With probability `p`, adds an independent offset in `[-limit, limit]` to each of R, G and B.
#[derive(Debug, Clone)]
pub struct RandomRgbShift {
    limit: f32,
    p: f64,
}

impl RandomRgbShift {
    pub fn new(limit: f32, p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(
            (0.0..=255.0).contains(&limit),
            "RGB shift limit must be in [0, 255] (got {})",
            limit
        );
        Ok(Self { limit, p })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomRgbShift {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if !gen_bool(self.p) {
            return Ok(img);
        }
        let shift: [f32; 3] =
            std::array::from_fn(|_| gen_range_inclusive(-self.limit, self.limit));
        Ok(map_rgb(img, |rgb| {
            for pixel in rgb.pixels_mut() {
                for (c, v) in pixel.0.iter_mut().enumerate() {
                    *v = clamp_u8(f32::from(*v) + shift[c]);
                }
            }
        }))
    }
}

// ============================================================================
// RandomGaussNoise
// ============================================================================

/// With probability `p`, adds zero-mean Gaussian noise to every channel of every pixel.
///
/// The noise variance is drawn uniformly from `[0, var_limit]` once per image.
#[derive(Debug, Clone)]
pub struct RandomGaussNoise {
    var_limit: f32,
    p: f64,
}

impl RandomGaussNoise {
    pub fn new(var_limit: f32, p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(
            var_limit >= 0.0 && var_limit.is_finite(),
            "Noise variance limit must be a non-negative number (got {})",
            var_limit
        );
        Ok(Self { var_limit, p })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomGaussNoise {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if !gen_bool(self.p) {
            return Ok(img);
        }
        let sigma = gen_range_inclusive(0.0, self.var_limit).sqrt();
        if sigma == 0.0 {
            return Ok(img);
        }
        let normal = Normal::new(0.0f32, sigma)
            .map_err(|e| anyhow!("Invalid noise sigma {}: {}", sigma, e))?;

        Ok(map_rgb(img, |rgb| {
            with_pass_rng(|rng| {
                for v in rgb.iter_mut() {
                    *v = clamp_u8(f32::from(*v) + normal.sample(rng));
                }
            })
        }))
    }
}

// ============================================================================
// RandomBrightnessContrast
// ============================================================================

/// With probability `p`, applies `v' = alpha * v + beta * 255` with
/// `alpha = 1 + uniform(contrast)` and `beta = uniform([-brightness, brightness])`.
///
/// # Example
/// ```ignore
/// // Slightly darker or lighter, never more contrast.
/// let jitter = RandomBrightnessContrast::new(0.05, (-0.2, 0.0), 0.2)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomBrightnessContrast {
    brightness: f32,
    contrast: (f32, f32),
    p: f64,
}

impl RandomBrightnessContrast {
    pub fn new(brightness: f32, contrast: (f32, f32), p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(brightness >= 0.0, "Brightness limit must be >= 0 (got {})", brightness);
        ensure!(
            contrast.0 <= contrast.1 && contrast.0 >= -1.0,
            "Contrast range must be ordered and >= -1 (got {:?})",
            contrast
        );
        Ok(Self {
            brightness,
            contrast,
            p,
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomBrightnessContrast {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if !gen_bool(self.p) {
            return Ok(img);
        }
        let alpha = 1.0 + gen_range_inclusive(self.contrast.0, self.contrast.1);
        let beta = gen_range_inclusive(-self.brightness, self.brightness) * 255.0;
        Ok(map_rgb(img, |rgb| {
            for v in rgb.iter_mut() {
                *v = clamp_u8(alpha * f32::from(*v) + beta);
            }
        }))
    }
}

// ============================================================================
// RandomJpegCompression
// ============================================================================

/// With probability `p`, re-encodes the image as JPEG at a quality drawn uniformly from
/// `[quality_lower, 100]` and decodes it again, leaving compression artifacts behind.
#[derive(Debug, Clone)]
pub struct RandomJpegCompression {
    quality_lower: u8,
    p: f64,
}

impl RandomJpegCompression {
    pub fn new(quality_lower: u8, p: f64) -> Result<Self> {
        check_probability(p)?;
        ensure!(
            (1..=100).contains(&quality_lower),
            "JPEG quality must be in [1, 100] (got {})",
            quality_lower
        );
        Ok(Self { quality_lower, p })
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomJpegCompression {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        if !gen_bool(self.p) {
            return Ok(img);
        }
        let quality = with_pass_rng(|rng| rng.random_range(self.quality_lower..=100));
        let rgb = img.to_rgb8();

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(&rgb)
            .context("Failed to JPEG-encode image")?;
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .context("Failed to decode JPEG-compressed image")?;
        Ok(DynamicImage::ImageRgb8(decoded.to_rgb8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    fn gray_rgb(v: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([v, v, v])))
    }

    #[test]
    fn probabilities_are_validated() {
        assert!(RandomInvert::new(1.5).is_err());
        assert!(RandomRgbShift::new(15.0, -0.1).is_err());
        assert!(RandomGaussNoise::new(-1.0, 0.5).is_err());
        assert!(RandomBrightnessContrast::new(0.05, (0.0, -0.2), 0.2).is_err());
        assert!(RandomJpegCompression::new(0, 0.5).is_err());
        assert!(RandomJpegCompression::new(95, 2.0).is_err());
    }

    #[test]
    fn p_zero_is_identity_and_p_one_always_applies() -> Result<()> {
        let img = gray_rgb(200);
        assert_eq!(RandomInvert::new(0.0)?.apply(img.clone())?.as_bytes(), img.as_bytes());
        assert_eq!(RandomInvert::new(1.0)?.apply(img)?.as_bytes()[0], 55);
        Ok(())
    }

    #[test]
    fn rgb_shift_stays_within_limit() -> Result<()> {
        let shifted = RandomRgbShift::new(15.0, 1.0)?.apply(gray_rgb(100))?;
        for &v in shifted.as_bytes() {
            assert!((85..=115).contains(&v), "shifted value {v} out of range");
        }
        Ok(())
    }

    #[test]
    fn augmentations_keep_dimensions() -> Result<()> {
        let img = gray_rgb(128);
        let noisy = RandomGaussNoise::new(10.0, 1.0)?.apply(img)?;
        let jittered = RandomBrightnessContrast::new(0.05, (-0.2, 0.0), 1.0)?.apply(noisy)?;
        assert_eq!(jittered.dimensions(), (4, 3));
        Ok(())
    }

    #[test]
    fn contrast_reduction_never_brightens_white_past_white() -> Result<()> {
        let out = RandomBrightnessContrast::new(0.0, (-0.2, 0.0), 1.0)?.apply(gray_rgb(255))?;
        for &v in out.as_bytes() {
            assert!((204..=255).contains(&v));
        }
        Ok(())
    }

    #[test]
    fn jpeg_compression_keeps_dimensions_and_stays_close() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(16, 9, |x, y| {
            let v = if (x + y) % 2 == 0 { 40 } else { 220 };
            Rgb([v, v, v])
        }));
        let out = RandomJpegCompression::new(95, 1.0)?.apply(img.clone())?;
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
        assert_eq!(out.dimensions(), (16, 9));

        let max_diff = img
            .as_bytes()
            .iter()
            .zip(out.as_bytes())
            .map(|(&a, &b)| (i16::from(a) - i16::from(b)).abs())
            .max()
            .unwrap_or(0);
        assert!(max_diff < 128, "JPEG round trip drifted by {max_diff}");
        Ok(())
    }

    #[test]
    fn jpeg_compression_with_p_zero_is_identity() -> Result<()> {
        let img = gray_rgb(77);
        let out = RandomJpegCompression::new(95, 0.0)?.apply(img.clone())?;
        assert_eq!(out.as_bytes(), img.as_bytes());
        Ok(())
    }
}
