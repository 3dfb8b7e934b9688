use crate::collator::Collator;
use crate::features::Features;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tch::{Device, Tensor};

/// A batch of token fields grouped for model input.
///
/// Each tensor has shape `[batch_size, seq_len]`. Fields are padded independently, so
/// `"input_ids"` and `"attention_mask"` share a batch size but not necessarily a length.
#[derive(Debug)]
pub struct MiniBatch {
    pub tensors: HashMap<String, Tensor>,
}

impl MiniBatch {
    /// Builds a `MiniBatch` by handing `samples` to `collator`.
    pub fn collate(samples: &[Features], collator: &impl Collator) -> Result<Self> {
        collator.collate(samples)
    }

    /// Returns the number of samples in the batch.
    pub fn batch_size(&self) -> Result<i64> {
        self.tensors
            .values()
            .next()
            .map(|t| t.size()[0])
            .ok_or(anyhow!("Empty mini-batch"))
    }

    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.tensors
            .get(feature)
            .ok_or_else(|| anyhow!("Feature '{}' not found in mini-batch", feature))
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Transfers all tensors to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            tensors: self
                .tensors
                .iter()
                .map(|(name, tensor)| (name.clone(), tensor.to_device(device)))
                .collect(),
        }
    }
}

/// One loaded batch: padded token fields aligned row-for-row with a stacked image tensor.
///
/// `images` has shape `[N, 1, H, W]`. Row `i` of every token field, row `i` of `images` and
/// `paths[i]` all describe the same sample. Samples whose image could not be read are absent from
/// all three.
#[derive(Debug)]
pub struct TrainingBatch {
    pub tokens: MiniBatch,
    pub images: Tensor,
    pub paths: Vec<PathBuf>,
}

impl TrainingBatch {
    pub fn batch_size(&self) -> usize {
        self.paths.len()
    }

    /// Shortcut for the `"input_ids"` token field.
    pub fn input_ids(&self) -> Result<&Tensor> {
        self.tokens.get("input_ids")
    }

    /// Transfers tokens and images to the target device. Paths are copied.
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            tokens: self.tokens.to_device(device),
            images: self.images.to_device(device),
            paths: self.paths.clone(),
        }
    }
}
