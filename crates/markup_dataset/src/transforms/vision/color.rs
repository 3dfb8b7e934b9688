use crate::transforms::Transform;
use anyhow::Result;
use image::DynamicImage;

/// Converts any decoded image to 8-bit RGB.
///
/// The augmentations work on RGB pixels, so the train pipeline starts here. Rendered formulas
/// are often saved as grayscale or with an alpha channel.
#[derive(Debug, Clone)]
pub struct EnsureRGB;

impl Transform<DynamicImage, DynamicImage> for EnsureRGB {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(_) => img,
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        })
    }
}

/// Converts to 8-bit luminance.
#[derive(Debug, Clone)]
pub struct ToGray;

impl Transform<DynamicImage, DynamicImage> for ToGray {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageLuma8(_) => img,
            _ => DynamicImage::ImageLuma8(img.to_luma8()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayAlphaImage, LumaA, Rgb, RgbImage};

    #[test]
    fn ensure_rgb_drops_alpha() -> Result<()> {
        let img = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(2, 2, LumaA([200, 10])));
        let rgb = EnsureRGB.apply(img)?;
        assert!(matches!(rgb, DynamicImage::ImageRgb8(_)));
        assert_eq!(rgb.dimensions(), (2, 2));
        Ok(())
    }

    #[test]
    fn gray_of_white_is_white() -> Result<()> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));
        let gray = ToGray.apply(img)?;
        assert!(matches!(gray, DynamicImage::ImageLuma8(_)));
        assert_eq!(gray.as_bytes(), &[255]);
        Ok(())
    }
}
