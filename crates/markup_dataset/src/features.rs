use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tch::Tensor;

/// Tensors produced for one sample of a batch, keyed by feature name.
///
/// The loader builds one `Features` per token sequence (`"input_ids"`, `"attention_mask"`) and
/// one per decoded image (`"image"`), then hands them to a [`Collator`](crate::collator::Collator).
///
/// # Examples:
/// - Targets: `{"input_ids": Tensor([1, 7, 5, 2]), "attention_mask": Tensor([1, 1, 1, 1])}`
/// - Image: `{"image": Tensor([1, H, W])}`
#[derive(Debug)]
pub struct Features {
    pub features: HashMap<String, Tensor>,
}

/// Creates a shallow clone of the `Features`
impl Clone for Features {
    fn clone(&self) -> Self {
        let features = self
            .features
            .iter()
            .map(|(k, v)| (k.clone(), v.shallow_clone()))
            .collect();
        Self { features }
    }
}

impl Features {
    pub fn new(features: HashMap<String, Tensor>) -> Self {
        Self { features }
    }

    /// Creates `Features` from a single `(feature_name, tensor)` pair.
    ///
    /// Chain with [`with_feature`](Self::with_feature) to add more features.
    pub fn from_single(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            features: HashMap::from([(name.into(), tensor)]),
        }
    }

    /// Adds or overwrites a feature.
    pub fn with_feature(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.features.insert(name.into(), tensor);
        self
    }

    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.features
            .get(feature)
            .ok_or_else(|| anyhow!("Feature {} not found", feature))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}
