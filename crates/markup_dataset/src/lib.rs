//! Dimension-bucketed datasets of rendered markup images and their source text.
//!
//! Images are grouped by exact `(width, height)` so that every batch stacks without resizing.
//! The flow is:
//!
//! ```text
//! targets file + image dir ─▶ DimensionIndex ─▶ BatchPlanner ─▶ DatasetIter ─▶ SampleLoader
//!                                (buckets)        (Plan)         (cursor)      (TrainingBatch)
//! ```
//!
//! ```ignore
//! let config = DatasetConfig::builder().batch_size(16).max_dimensions((1024, 512)).build()?;
//! let dataset = Dataset::from_files(targets, images, tokenizer, config, &AbortSignal::new())?;
//! for batch in dataset.iter()?.flatten() {
//!     let (ids, images) = (batch.input_ids()?, &batch.images);
//! }
//! ```

pub mod collator;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod index;
pub mod iterator;
pub mod loader;
pub mod minibatch;
pub mod planner;
pub mod readers;
pub mod rng;
pub mod sample;
pub mod transforms;

pub use config::{ConfigUpdate, DatasetConfig};
pub use dataset::Dataset;
pub use error::{DatasetError, Result};
pub use index::{AbortSignal, DimensionIndex};
pub use iterator::{DatasetIter, IterState};
pub use loader::SampleLoader;
pub use minibatch::{MiniBatch, TrainingBatch};
pub use planner::{BatchDescriptor, BatchPlanner, Plan};
pub use sample::{Bucket, DimensionKey, Sample};
