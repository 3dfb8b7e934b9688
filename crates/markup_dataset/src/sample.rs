use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A single indexed training example: one line of markup paired with the image that renders it.
///
/// The `id` is the integer stem of the image filename and doubles as the line number of
/// `target` inside the targets file. Samples are immutable once indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    id: usize,
    target: String,
    image_path: PathBuf,
}

impl Sample {
    pub fn new(id: usize, target: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            target: target.into(),
            image_path: image_path.into(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

/// Exact `(width, height)` of an image in pixels.
///
/// Ordered by width, then height, so buckets are always visited in the same order.
/// Serialized as a `[width, height]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct DimensionKey {
    pub width: u32,
    pub height: u32,
}

impl DimensionKey {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if both sides are non-zero and no larger than `max`.
    pub fn fits_within(&self, max: DimensionKey) -> bool {
        0 < self.width && self.width <= max.width && 0 < self.height && self.height <= max.height
    }
}

impl From<(u32, u32)> for DimensionKey {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<DimensionKey> for (u32, u32) {
    fn from(key: DimensionKey) -> Self {
        (key.width, key.height)
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// All samples whose image has exactly the dimensions `key`, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    key: DimensionKey,
    samples: Vec<Sample>,
}

impl Bucket {
    pub fn new(key: DimensionKey, samples: Vec<Sample>) -> Self {
        Self { key, samples }
    }

    pub fn key(&self) -> DimensionKey {
        self.key
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_key_bounds_are_inclusive() {
        let max = DimensionKey::new(15, 15);
        assert!(DimensionKey::new(15, 15).fits_within(max));
        assert!(DimensionKey::new(10, 10).fits_within(max));
        assert!(!DimensionKey::new(16, 10).fits_within(max));
        assert!(!DimensionKey::new(10, 16).fits_within(max));
        assert!(!DimensionKey::new(0, 10).fits_within(max));
    }

    #[test]
    fn dimension_key_orders_by_width_then_height() {
        let mut keys = vec![
            DimensionKey::new(20, 5),
            DimensionKey::new(10, 30),
            DimensionKey::new(10, 10),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                DimensionKey::new(10, 10),
                DimensionKey::new(10, 30),
                DimensionKey::new(20, 5)
            ]
        );
    }

    #[test]
    fn dimension_key_serializes_as_pair() -> serde_json::Result<()> {
        let key = DimensionKey::new(1024, 512);
        assert_eq!(serde_json::to_string(&key)?, "[1024,512]");
        let back: DimensionKey = serde_json::from_str("[1024,512]")?;
        assert_eq!(back, key);
        Ok(())
    }
}
