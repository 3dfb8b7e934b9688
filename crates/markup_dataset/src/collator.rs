use crate::features::Features;
use crate::minibatch::MiniBatch;
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use tch::Tensor;

/// A `Collator` defines how to pad and combine per-sample [`Features`] into a [`MiniBatch`].
pub trait Collator {
    fn collate(&self, samples: &[Features]) -> Result<MiniBatch>;
}

/// Checks that every sample carries exactly the feature names of the first one.
fn validate_feature_keys(samples: &[Features]) -> Result<HashSet<&String>> {
    if samples.is_empty() {
        bail!("Cannot collate empty sample list");
    }

    let first_keys: HashSet<&String> = samples[0].features.keys().collect();
    for (i, sample) in samples.iter().enumerate().skip(1) {
        let missing_keys: Vec<&String> = first_keys
            .iter()
            .filter(|&&k| !sample.features.contains_key(k))
            .cloned()
            .collect();

        let extra_keys: Vec<&String> = sample
            .features
            .keys()
            .filter(|k| !first_keys.contains(k))
            .collect();

        if !missing_keys.is_empty() || !extra_keys.is_empty() {
            bail!(
                "Sample #{} has mismatch feature keys:\n -Missing: {:?}\n -Extra: {:?}",
                i,
                missing_keys,
                extra_keys
            )
        }
    }
    Ok(first_keys)
}

/// A `Collator` that stacks tensors with identical shapes along a new batch dimension (dim 0).
///
/// There is no padding here: a single shape mismatch fails the whole batch. The loader relies
/// on this to reject image batches whose transforms produced inconsistent sizes.
#[derive(Debug, Clone, Copy)]
pub struct StackCollator;

impl Collator for StackCollator {
    fn collate(&self, samples: &[Features]) -> Result<MiniBatch> {
        let keys = validate_feature_keys(samples)?;

        let mut tensors = HashMap::with_capacity(keys.len());
        for key in keys {
            let tensors_to_stack: Vec<&Tensor> = samples.iter().map(|s| &s.features[key]).collect();

            let reference_shape = tensors_to_stack[0].size();
            for (i, tensor) in tensors_to_stack.iter().enumerate() {
                if tensor.size() != reference_shape {
                    bail!(
                        "Shape mismatch in sample {} for feature '{}': expected {:?}, got {:?}",
                        i,
                        key,
                        reference_shape,
                        tensor.size()
                    );
                }
            }

            // Shapes were validated above, so stacking cannot fail.
            tensors.insert(key.clone(), Tensor::stack(&tensors_to_stack, 0));
        }
        Ok(MiniBatch { tensors })
    }
}

// ============================================================================
/// Defines how a tensor dimension should be padded across a batch.
#[derive(Debug, Clone, Copy)]
pub enum PaddingRule {
    /// Pad to the largest size found in this batch.
    MaxLength,
    /// Pad (or truncate) on the right/bottom to exactly this size.
    FixedRight(i64),
}

/// Pads `tensor` on the right/bottom of each listed dimension up to the paired length, filling
/// with `pad_value`. Dimensions already longer than their target are truncated.
fn pad_right(tensor: &Tensor, targets: &[(usize, i64)], pad_value: f64) -> Result<Tensor> {
    let mut result = tensor.shallow_clone();
    for &(dim, target_len) in targets {
        let shape = result.size();
        if dim >= shape.len() {
            bail!(
                "Invalid padding dimension {} for tensor with {} dims",
                dim,
                shape.len()
            );
        }
        let current_len = shape[dim];

        match current_len.cmp(&target_len) {
            std::cmp::Ordering::Less => {
                let mut new_shape = shape.clone();
                new_shape[dim] = target_len;
                let padded =
                    Tensor::full(new_shape.as_slice(), pad_value, (result.kind(), result.device()));
                let mut dest_view = padded.narrow(dim as i64, 0, current_len);
                dest_view.copy_(&result);
                result = padded;
            }
            std::cmp::Ordering::Greater => {
                result = result.narrow(dim as i64, 0, target_len);
            }
            std::cmp::Ordering::Equal => {}
        }
    }
    Ok(result)
}

/// A `Collator` that pads variable-length tensors so they can be stacked into a [`MiniBatch`].
///
/// Rules are configured per feature and per dimension with [`pad`](Self::pad). Every feature
/// is padded independently, so `"input_ids"` and `"attention_mask"` may end up with different
/// lengths if their per-sample lengths differ. Features without rules must already agree in
/// shape.
///
/// # Example
/// ```ignore
/// let collator = PaddingCollator::new()
///     .pad("input_ids", vec![(0, PaddingRule::MaxLength)], None)
///     .pad(
///         "image",
///         vec![(1, PaddingRule::FixedRight(512)), (2, PaddingRule::FixedRight(1024))],
///         Some(1.19),
///     );
/// ```
#[derive(Debug, Default)]
pub struct PaddingCollator {
    pad_config: HashMap<String, Vec<(usize, PaddingRule)>>,
    // Features without an entry pad with 0.0
    pad_values: HashMap<String, f64>,
}

impl PaddingCollator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers padding rules for a given feature.
    ///
    /// # Arguments:
    /// - `feature`: feature name (e.g., `"input_ids"`)
    /// - `rules`: list of `(dimension, rule)` pairs
    /// - `pad_value`: optional padding value (defaults to 0.0)
    pub fn pad<I>(mut self, feature: impl ToString, rules: I, pad_value: Option<f64>) -> Self
    where
        I: IntoIterator<Item = (usize, PaddingRule)>,
    {
        let key = feature.to_string();
        self.pad_config
            .entry(key.clone())
            .or_default()
            .extend(rules);

        if let Some(v) = pad_value {
            self.pad_values.insert(key, v);
        }
        self
    }

    fn compute_targets(
        &self,
        tensors: &[&Tensor],
        rules: &[(usize, PaddingRule)],
    ) -> Result<Vec<(usize, i64)>> {
        let rank = tensors[0].dim();
        let mut targets = Vec::with_capacity(rules.len());
        for &(dim, rule) in rules {
            if dim >= rank {
                bail!(
                    "Invalid padding dimension {} for tensor with {} dims",
                    dim,
                    rank
                );
            }
            let len = match rule {
                PaddingRule::MaxLength => tensors.iter().map(|t| t.size()[dim]).max().unwrap_or(0),
                PaddingRule::FixedRight(n) => n,
            };
            targets.push((dim, len));
        }
        Ok(targets)
    }
}

impl Collator for PaddingCollator {
    fn collate(&self, samples: &[Features]) -> Result<MiniBatch> {
        let keys = validate_feature_keys(samples)?;

        let mut batched = HashMap::with_capacity(keys.len());
        for key in keys {
            let tensors: Vec<&Tensor> = samples.iter().map(|s| &s.features[key]).collect();

            let Some(rules) = self.pad_config.get(key) else {
                let reference_shape = tensors[0].size();
                if tensors.iter().any(|t| t.size() != reference_shape) {
                    bail!("Shape mismatch for non-padded feature '{}'", key);
                }
                batched.insert(key.clone(), Tensor::stack(&tensors, 0));
                continue;
            };

            let targets = self.compute_targets(&tensors, rules)?;
            let pad_value = self.pad_values.get(key).copied().unwrap_or(0.0);

            let padded = tensors
                .iter()
                .map(|t| pad_right(t, &targets, pad_value))
                .collect::<Result<Vec<_>>>()?;

            let reference_shape = padded[0].size();
            if padded.iter().any(|t| t.size() != reference_shape) {
                bail!(
                    "Feature '{}' still has mismatched shapes after padding on dims {:?}",
                    key,
                    targets.iter().map(|(d, _)| *d).collect::<Vec<_>>()
                );
            }
            batched.insert(key.clone(), Tensor::stack(&padded, 0));
        }
        Ok(MiniBatch { tensors: batched })
    }
}
