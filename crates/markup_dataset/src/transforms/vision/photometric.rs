use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::Tensor;

// ============================================================================
// Normalize
// ============================================================================

/// Normalizes tensors using channel-wise statistics.
///
/// ```text
/// output[c,h,w] = (input[c,h,w] - mean[c]) / std[c]
/// ```
///
/// # Example
/// ```ignore
/// let norm = Normalize::rendered_formulas();
/// let normalized = norm.apply(tensor)?;
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

/// Grayscale mean of rendered formula images (mostly white paper, thin dark strokes).
pub const FORMULA_MEAN: f32 = 0.7931;
/// Grayscale standard deviation of rendered formula images.
pub const FORMULA_STD: f32 = 0.1738;

impl Normalize {
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "Normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "Normalization mean has {} channels but std has {}",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|&s| s > 0.0),
            "Normalization std must be positive (got {:?})",
            std
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// Single-channel statistics of rendered formulas.
    pub fn rendered_formulas() -> Self {
        Self {
            mean: vec![FORMULA_MEAN],
            std: vec![FORMULA_STD],
        }
    }

    /// Where raw pixel value `v` (in `[0, 1]`) lands after normalizing channel 0.
    pub fn normalized_value(&self, v: f32) -> f64 {
        f64::from((v - self.mean[0]) / self.std[0])
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (num_channels, _height, _width) = tensor
            .size3()
            .context("Input must be 3D tensor [C, H, W]")?;

        // A single statistic applies to every channel.
        let (mean, std) = if self.mean.len() == 1 {
            (
                vec![self.mean[0]; num_channels as usize],
                vec![self.std[0]; num_channels as usize],
            )
        } else {
            ensure!(
                num_channels as usize == self.mean.len(),
                "Channel count mismatch: input has {} channels but normalization expects {}",
                num_channels,
                self.mean.len()
            );
            (self.mean.clone(), self.std.clone())
        };

        let mean_t = Tensor::from_slice(&mean)
            .reshape([num_channels, 1, 1])
            .to_kind(tensor.kind());
        let std_t = Tensor::from_slice(&std)
            .reshape([num_channels, 1, 1])
            .to_kind(tensor.kind());

        Ok((tensor - mean_t) / std_t)
    }
}
