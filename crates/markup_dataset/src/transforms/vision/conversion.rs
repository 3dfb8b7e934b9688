use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToTensor
// ============================================================================

/// Converts an image to a channel-first f32 tensor in [0.0, 1.0] range.
///
/// | Input Format  | Output Shape |
/// |---------------|--------------|
/// | Grayscale (L) | `[1, H, W]`  |
/// | RGB           | `[3, H, W]`  |
/// | Other         | `[3, H, W]`  |
#[derive(Debug, Clone)]
pub struct ToTensor;

impl Transform<DynamicImage, Tensor> for ToTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );
        let (h, w) = (height as i64, width as i64);

        let tensor = match img {
            DynamicImage::ImageLuma8(img) => Tensor::from_slice(img.as_raw()).reshape([1, h, w]),
            DynamicImage::ImageRgb8(img) => Tensor::from_slice(img.as_raw()).reshape([3, h, w]),
            _ => Tensor::from_slice(img.to_rgb8().as_raw()).reshape([3, h, w]),
        };

        tensor
            .to_kind(Kind::Float)
            .f_div_scalar(255.0)
            .context("Failed to scale tensor values")
    }
}

// ============================================================================
// FirstChannel
// ============================================================================

/// Keeps channel 0 of a `[C, H, W]` tensor, giving `[1, H, W]`.
///
/// Ends both image pipelines so a batch always stacks to `[N, 1, H, W]`, whatever the source
/// color type was.
#[derive(Debug, Clone)]
pub struct FirstChannel;

impl Transform<Tensor, Tensor> for FirstChannel {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (channels, _, _) = tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;
        ensure!(channels >= 1, "Tensor has no channels");
        Ok(tensor.narrow(0, 0, 1))
    }
}
