//! Groups samples into buckets keyed by their exact image dimensions.
//!
//! Only image headers are read while indexing. Pixel data is decoded later, one batch at a
//! time, by the [`SampleLoader`](crate::loader::SampleLoader).

use crate::error::{DatasetError, Result};
use crate::sample::{Bucket, DimensionKey, Sample};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag for index builds.
///
/// Clones share the same flag, so one copy can be moved into a signal handler while the
/// builder polls another. An aborted build keeps every bucket accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Buckets ordered by [`DimensionKey`], so unshuffled plans visit them in a stable order.
///
/// Serialized as a flat list of buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Bucket>", into = "Vec<Bucket>")]
pub struct DimensionIndex {
    buckets: BTreeMap<DimensionKey, Bucket>,
}

impl DimensionIndex {
    /// Indexes `image_paths` against `targets`.
    ///
    /// Each image's filename stem (text before the first `.`) must parse as an index into
    /// `targets`. A stem that does not parse, or an index past the end of `targets`, fails the
    /// whole build with [`DatasetError::MalformedDataset`]. Images whose header cannot be read
    /// are logged and skipped. Images larger than `max_dimensions` on either side are excluded.
    pub fn build(
        targets: &[String],
        image_paths: &[PathBuf],
        max_dimensions: DimensionKey,
        abort: &AbortSignal,
    ) -> Result<Self> {
        Self::build_inner(targets, image_paths, max_dimensions, abort, |_| {})
    }

    /// Same as [`build`](Self::build), advancing `progress` once per image.
    pub fn build_with_progress(
        targets: &[String],
        image_paths: &[PathBuf],
        max_dimensions: DimensionKey,
        abort: &AbortSignal,
        progress: &ProgressBar,
    ) -> Result<Self> {
        Self::build_inner(targets, image_paths, max_dimensions, abort, |_| progress.inc(1))
    }

    /// `on_image` is called with each image's position just before that image is indexed.
    pub(crate) fn build_inner(
        targets: &[String],
        image_paths: &[PathBuf],
        max_dimensions: DimensionKey,
        abort: &AbortSignal,
        mut on_image: impl FnMut(usize),
    ) -> Result<Self> {
        let mut index = Self::default();
        let mut excluded = 0usize;

        for (scanned, path) in image_paths.iter().enumerate() {
            if abort.is_aborted() {
                warn!(
                    scanned,
                    total = image_paths.len(),
                    "Index build aborted, keeping partial index"
                );
                break;
            }
            on_image(scanned);

            let id = sample_id(path)?;
            let target = targets.get(id).ok_or_else(|| {
                DatasetError::MalformedDataset(format!(
                    "sample id {} from {} is out of range for {} targets",
                    id,
                    path.display(),
                    targets.len()
                ))
            })?;

            let (width, height) = match image::image_dimensions(path) {
                Ok(dims) => dims,
                Err(e) => {
                    let err = DatasetError::UnreadableImage {
                        path: path.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{err}, skipping");
                    continue;
                }
            };

            let key = DimensionKey::new(width, height);
            if !key.fits_within(max_dimensions) {
                excluded += 1;
                continue;
            }
            index
                .buckets
                .entry(key)
                .or_insert_with(|| Bucket::new(key, Vec::new()))
                .push(Sample::new(id, target.as_str(), path.as_path()));
        }

        info!(
            samples = index.num_samples(),
            buckets = index.num_buckets(),
            excluded,
            max = %max_dimensions,
            "Built dimension index"
        );
        Ok(index)
    }

    pub fn from_buckets(buckets: impl IntoIterator<Item = Bucket>) -> Self {
        let mut index = Self::default();
        for bucket in buckets {
            let key = bucket.key();
            let entry = index
                .buckets
                .entry(key)
                .or_insert_with(|| Bucket::new(key, Vec::new()));
            for sample in bucket.samples() {
                entry.push(sample.clone());
            }
        }
        index
    }

    pub fn get(&self, key: &DimensionKey) -> Option<&Bucket> {
        self.buckets.get(key)
    }

    /// Buckets in ascending key order.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = DimensionKey> + '_ {
        self.buckets.keys().copied()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_samples(&self) -> usize {
        self.buckets.values().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of full batches of `batch_size` across all buckets.
    ///
    /// Each bucket contributes `floor(len / batch_size)`; a trailing short chunk never counts.
    pub fn full_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        self.buckets.values().map(|b| b.len() / batch_size).sum()
    }

    /// Drops every bucket whose key does not fit within `max`. Returns how many were dropped.
    ///
    /// This only ever shrinks the index: buckets removed earlier are not restored when `max`
    /// grows again.
    pub fn retain_within(&mut self, max: DimensionKey) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|key, _| key.fits_within(max));
        let dropped = before - self.buckets.len();
        if dropped > 0 {
            debug!(dropped, max = %max, "Dropped buckets outside dimension cap");
        }
        dropped
    }
}

impl From<Vec<Bucket>> for DimensionIndex {
    fn from(buckets: Vec<Bucket>) -> Self {
        Self::from_buckets(buckets)
    }
}

impl From<DimensionIndex> for Vec<Bucket> {
    fn from(index: DimensionIndex) -> Self {
        index.buckets.into_values().collect()
    }
}

/// Parses the sample id encoded in an image filename, e.g. `12.png` or `12.rendered.png` -> 12.
fn sample_id(path: &Path) -> Result<usize> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .and_then(|stem| stem.parse::<usize>().ok())
        .ok_or_else(|| {
            DatasetError::MalformedDataset(format!(
                "image filename {} does not encode a sample id",
                path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(w: u32, h: u32, ids: &[usize]) -> Bucket {
        let samples = ids
            .iter()
            .map(|&id| Sample::new(id, format!("t{id}"), format!("{id}.png")))
            .collect();
        Bucket::new(DimensionKey::new(w, h), samples)
    }

    #[test]
    fn parses_sample_ids_from_stems() -> Result<()> {
        assert_eq!(sample_id(Path::new("data/12.png"))?, 12);
        assert_eq!(sample_id(Path::new("data/7.rendered.png"))?, 7);
        assert!(matches!(
            sample_id(Path::new("data/formula.png")),
            Err(DatasetError::MalformedDataset(_))
        ));
        Ok(())
    }

    #[test]
    fn full_batches_is_floor_sum() {
        let index =
            DimensionIndex::from_buckets(vec![bucket(10, 10, &[0, 1, 2]), bucket(20, 20, &[3])]);
        assert_eq!(index.full_batches(2), 1);
        assert_eq!(index.full_batches(1), 4);
        assert_eq!(index.full_batches(0), 0);
        assert_eq!(index.num_samples(), 4);
    }

    #[test]
    fn retain_within_only_shrinks() {
        let mut index =
            DimensionIndex::from_buckets(vec![bucket(10, 10, &[0, 1]), bucket(20, 20, &[2])]);
        assert_eq!(index.retain_within(DimensionKey::new(15, 15)), 1);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec![DimensionKey::new(10, 10)]);

        assert_eq!(index.retain_within(DimensionKey::new(100, 100)), 0);
        assert_eq!(index.num_buckets(), 1);
    }

    #[test]
    fn from_buckets_merges_duplicate_keys() {
        let index =
            DimensionIndex::from_buckets(vec![bucket(10, 10, &[0]), bucket(10, 10, &[1])]);
        assert_eq!(index.num_buckets(), 1);
        let ids: Vec<_> = index
            .get(&DimensionKey::new(10, 10))
            .map(|b| b.samples().iter().map(Sample::id).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn serializes_as_bucket_list() -> anyhow::Result<()> {
        let index =
            DimensionIndex::from_buckets(vec![bucket(20, 20, &[2]), bucket(10, 10, &[0, 1])]);
        let json = serde_json::to_string(&index)?;
        assert!(json.starts_with("[{\"key\":[10,10]"));
        let back: DimensionIndex = serde_json::from_str(&json)?;
        assert_eq!(back, index);
        Ok(())
    }

    #[test]
    fn aborted_build_keeps_nothing_when_aborted_upfront() -> Result<()> {
        let abort = AbortSignal::new();
        abort.abort();
        let index = DimensionIndex::build(
            &["x".to_string()],
            &[PathBuf::from("0.png")],
            DimensionKey::new(10, 10),
            &abort,
        )?;
        assert!(index.is_empty());
        Ok(())
    }

    #[test]
    fn abort_mid_scan_keeps_images_already_indexed() -> anyhow::Result<()> {
        use image::{Rgb, RgbImage};

        let dir = tempfile::tempdir()?;
        let mut paths = Vec::new();
        for (id, side) in [(0, 10), (1, 20), (2, 10), (3, 20), (4, 10)] {
            let path = dir.path().join(format!("{id}.png"));
            RgbImage::from_pixel(side, side, Rgb([255, 255, 255])).save(&path)?;
            paths.push(path);
        }
        let targets: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();

        let abort = AbortSignal::new();
        let index = DimensionIndex::build_inner(
            &targets,
            &paths,
            DimensionKey::new(100, 100),
            &abort,
            |position| {
                if position == 2 {
                    abort.abort();
                }
            },
        )?;

        let mut ids: Vec<usize> = index
            .buckets()
            .flat_map(|b| b.samples().iter().map(Sample::id))
            .collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(index.get(&DimensionKey::new(10, 10)).map(Bucket::len), Some(2));
        assert_eq!(index.get(&DimensionKey::new(20, 20)).map(Bucket::len), Some(1));
        Ok(())
    }
}
