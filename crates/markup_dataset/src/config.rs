//! Batching configuration for a [`Dataset`](crate::dataset::Dataset).
//!
//! A `DatasetConfig` is an immutable value. Reconfiguration never mutates it in place: a
//! [`ConfigUpdate`] is applied to produce a new, validated configuration that replaces the old
//! one wholesale.
//!
//! Example:
//! ```ignore
//! let config = DatasetConfig::builder()
//!     .batch_size(32)
//!     .shuffle(true)
//!     .max_dimensions(DimensionKey::new(1024, 512))
//!     .seed(42)
//!     .build()?;
//! ```

use crate::error::{DatasetError, Result};
use crate::sample::DimensionKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Number of samples per batch (must be > 0)
    pub batch_size: usize,
    /// Shuffle samples within buckets and batches across buckets on every `start()`
    pub shuffle: bool,
    /// Pad stacked images bottom/right to `max_dimensions`
    pub pad: bool,
    /// Largest accepted `(width, height)`, inclusive
    pub max_dimensions: DimensionKey,
    /// Keep the trailing short chunk of each bucket instead of dropping it
    pub keep_smaller_batches: bool,
    /// Use the deterministic test pipeline instead of the augmenting train pipeline
    pub test_mode: bool,
    /// Random seed for reproducible shuffling and augmentation
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            shuffle: true,
            pad: false,
            max_dimensions: DimensionKey::new(1024, 512),
            keep_smaller_batches: false,
            test_mode: false,
            seed: None,
        }
    }
}

impl DatasetConfig {
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    /// Rejects a zero batch size and zero-sized dimension bounds.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DatasetError::InvalidConfiguration(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.max_dimensions.width == 0 || self.max_dimensions.height == 0 {
            return Err(DatasetError::InvalidConfiguration(format!(
                "max_dimensions must be positive, got {}",
                self.max_dimensions
            )));
        }
        Ok(())
    }

    /// Returns a new configuration with every field present in `update` replaced.
    ///
    /// The result is validated before it is returned; `self` is left untouched.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<DatasetConfig> {
        let mut next = *self;
        if let Some(batch_size) = update.batch_size {
            next.batch_size = batch_size;
        }
        if let Some(shuffle) = update.shuffle {
            next.shuffle = shuffle;
        }
        if let Some(pad) = update.pad {
            next.pad = pad;
        }
        if let Some(keep) = update.keep_smaller_batches {
            next.keep_smaller_batches = keep;
        }
        if let Some(test_mode) = update.test_mode {
            next.test_mode = test_mode;
        }
        if let Some(max_dimensions) = update.max_dimensions {
            next.max_dimensions = max_dimensions;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Builder for DatasetConfig with method chaining
#[derive(Default)]
pub struct DatasetConfigBuilder {
    config: DatasetConfig,
}

impl DatasetConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn pad(mut self, pad: bool) -> Self {
        self.config.pad = pad;
        self
    }

    pub fn max_dimensions(mut self, max: impl Into<DimensionKey>) -> Self {
        self.config.max_dimensions = max.into();
        self
    }

    pub fn keep_smaller_batches(mut self, keep: bool) -> Self {
        self.config.keep_smaller_batches = keep;
        self
    }

    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.config.test_mode = test_mode;
        self
    }

    /// Set the random seed for reproducible data loading.
    ///
    /// When set, this seed controls:
    /// - Bucket and batch shuffling (if shuffle = true)
    /// - Random augmentations in the train pipeline
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Validates and returns the final configuration.
    pub fn build(self) -> Result<DatasetConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// A typed set of changes to a [`DatasetConfig`].
///
/// Only the six reconfigurable options exist here. When deserialized, unrecognized keys are
/// ignored so older callers can keep sending options this version does not know about.
///
/// ```ignore
/// let update = ConfigUpdate::from_json(r#"{"batch_size": 8, "max_dimensions": [512, 256]}"#)?;
/// dataset.update(update)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub batch_size: Option<usize>,
    pub shuffle: Option<bool>,
    pub pad: Option<bool>,
    pub keep_smaller_batches: Option<bool>,
    pub test_mode: Option<bool>,
    pub max_dimensions: Option<DimensionKey>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }

    pub fn pad(mut self, pad: bool) -> Self {
        self.pad = Some(pad);
        self
    }

    pub fn keep_smaller_batches(mut self, keep: bool) -> Self {
        self.keep_smaller_batches = Some(keep);
        self
    }

    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = Some(test_mode);
        self
    }

    pub fn max_dimensions(mut self, max: impl Into<DimensionKey>) -> Self {
        self.max_dimensions = Some(max.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
