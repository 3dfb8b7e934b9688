use super::{
    EnsureRGB, FirstChannel, Normalize, RandomBrightnessContrast, RandomGaussNoise, RandomInvert,
    RandomJpegCompression, RandomRgbShift, ToGray, ToTensor,
};
use crate::transforms::Transform;
use anyhow::Result;
use image::DynamicImage;
use tch::Tensor;

/// The image half of sample loading: decoded image in, `[1, H, W]` normalized tensor out.
///
/// Two fixed compositions exist:
/// - **test**: grayscale, scale to `[0, 1]`, normalize, keep channel 0.
/// - **train**: the same, preceded by random inversion (p=0.15), RGB shift of up to ±15
///   (p=0.3), Gaussian noise with variance up to 10 (p=0.2), a small brightness/contrast
///   jitter (p=0.2) and a JPEG round trip at quality 95 or better (p=0.5).
///
/// The iterator picks one of these when a pass starts; it does not change mid-pass.
pub struct ImagePipeline {
    transform: Box<dyn Transform<DynamicImage, Tensor>>,
    normalize: Normalize,
    test_mode: bool,
}

impl ImagePipeline {
    pub fn test() -> Self {
        let normalize = Normalize::rendered_formulas();
        let transform = ToGray
            .then(ToTensor)
            .then(normalize.clone())
            .then(FirstChannel);
        Self {
            transform: Box::new(transform),
            normalize,
            test_mode: true,
        }
    }

    pub fn train() -> Result<Self> {
        let normalize = Normalize::rendered_formulas();
        let transform = EnsureRGB
            .then(RandomInvert::new(0.15)?)
            .then(RandomRgbShift::new(15.0, 0.3)?)
            .then(RandomGaussNoise::new(10.0, 0.2)?)
            .then(RandomBrightnessContrast::new(0.05, (-0.2, 0.0), 0.2)?)
            .then(RandomJpegCompression::new(95, 0.5)?)
            .then(ToGray)
            .then(ToTensor)
            .then(normalize.clone())
            .then(FirstChannel);
        Ok(Self {
            transform: Box::new(transform),
            normalize,
            test_mode: false,
        })
    }

    pub fn for_test_mode(test_mode: bool) -> Result<Self> {
        if test_mode {
            Ok(Self::test())
        } else {
            Self::train()
        }
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// Normalized value of a white pixel: the fill for padded canvas area.
    pub fn background(&self) -> f64 {
        self.normalize.normalized_value(1.0)
    }
}

impl Transform<DynamicImage, Tensor> for ImagePipeline {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        self.transform.apply(img)
    }
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn both_pipelines_produce_single_channel_tensors() -> Result<()> {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(6, 4, Rgba([10, 20, 30, 255])));
        for pipeline in [ImagePipeline::test(), ImagePipeline::train()?] {
            let tensor = pipeline.apply(rgba.clone())?;
            assert_eq!(tensor.size(), vec![1, 4, 6]);
        }
        Ok(())
    }

    #[test]
    fn test_pipeline_maps_white_to_background() -> Result<()> {
        let pipeline = ImagePipeline::test();
        assert!(pipeline.is_test_mode());
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])));
        let tensor = pipeline.apply(white)?;
        assert!((tensor.double_value(&[0, 0, 0]) - pipeline.background()).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn mode_selection() -> Result<()> {
        assert!(ImagePipeline::for_test_mode(true)?.is_test_mode());
        assert!(!ImagePipeline::for_test_mode(false)?.is_test_mode());
        Ok(())
    }
}
