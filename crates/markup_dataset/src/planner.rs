use crate::config::DatasetConfig;
use crate::error::{DatasetError, Result};
use crate::index::DimensionIndex;
use crate::sample::{Bucket, DimensionKey};
use rand::seq::SliceRandom;
use rand::Rng;

/// One batch of a [`Plan`]: positions into the samples of a single bucket.
///
/// A descriptor never spans buckets, so every sample it refers to has image dimensions exactly
/// equal to `key`. Resolve it against the index with
/// [`Dataset::resolve`](crate::dataset::Dataset::resolve).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDescriptor {
    pub key: DimensionKey,
    pub positions: Vec<usize>,
}

impl BatchDescriptor {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// The ordered batches for one iteration pass.
///
/// A plan is never edited: every `start()` or reconfiguration builds a new one and drops the
/// previous plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    batches: Vec<BatchDescriptor>,
}

impl Plan {
    pub fn batches(&self) -> &[BatchDescriptor] {
        &self.batches
    }

    pub fn get(&self, cursor: usize) -> Option<&BatchDescriptor> {
        self.batches.get(cursor)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// ============================================================================
/// Splits each bucket of a [`DimensionIndex`] into batches.
///
/// For every bucket, independently:
/// 1. Visit samples in insertion order, or in a uniformly random permutation if `shuffle`.
/// 2. Cut the sequence into contiguous chunks of `batch_size`.
/// 3. Drop the last chunk if it is short and `keep_smaller_batches` is false.
///
/// The per-bucket chunk lists are concatenated in key order. With `shuffle`, the whole list is
/// permuted once more so batch order is randomized across buckets too.
///
/// A bucket holding a single sample yields a one-element chunk, which is a valid batch when
/// short batches are kept.
///
/// # Example
/// ```ignore
/// let planner = BatchPlanner::new(2, false, false)?;
/// let plan = planner.plan(&index, &mut rand::rng());
/// for batch in plan.batches() {
///     assert_eq!(batch.len(), 2);
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    batch_size: usize,
    shuffle: bool,
    keep_smaller_batches: bool,
}

impl BatchPlanner {
    pub fn new(batch_size: usize, shuffle: bool, keep_smaller_batches: bool) -> Result<Self> {
        if batch_size == 0 {
            return Err(DatasetError::InvalidConfiguration(
                "batch_size must be > 0, but got batch_size=0".into(),
            ));
        }
        Ok(Self {
            batch_size,
            shuffle,
            keep_smaller_batches,
        })
    }

    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        Self::new(config.batch_size, config.shuffle, config.keep_smaller_batches)
    }

    /// Builds a fresh plan. `rng` is only drawn from when shuffling.
    pub fn plan<R: Rng + ?Sized>(&self, index: &DimensionIndex, rng: &mut R) -> Plan {
        let capacity = index.full_batches(self.batch_size) + index.num_buckets();
        let mut batches = Vec::with_capacity(capacity);
        for bucket in index.buckets() {
            self.chunk_bucket(bucket, rng, &mut batches);
        }
        if self.shuffle {
            batches.shuffle(rng);
        }
        Plan { batches }
    }

    fn chunk_bucket<R: Rng + ?Sized>(
        &self,
        bucket: &Bucket,
        rng: &mut R,
        out: &mut Vec<BatchDescriptor>,
    ) {
        let mut order: Vec<usize> = (0..bucket.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        for chunk in order.chunks(self.batch_size) {
            if chunk.len() < self.batch_size && !self.keep_smaller_batches {
                continue;
            }
            out.push(BatchDescriptor {
                key: bucket.key(),
                positions: chunk.to_vec(),
            });
        }
    }
}
