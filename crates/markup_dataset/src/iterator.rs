//! Restartable, pull-based pass over a [`Dataset`].
//!
//! ```text
//!   Fresh ──start()──▶ Active ──next() past the plan──▶ Exhausted
//!                        ▲                                  │
//!                        └────────────start()───────────────┘
//! ```
//!
//! `start()` may be called from any state. Each call draws a new pass number from the
//! dataset, reseeds this iterator's augmentation RNG, picks the image pipeline for the current
//! mode and builds a new plan with the cursor at 0. There is no implicit wraparound: once
//! exhausted, the iterator keeps returning `None` until restarted.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::loader::SampleLoader;
use crate::minibatch::TrainingBatch;
use crate::planner::{BatchPlanner, Plan};
use crate::rng::{pass_rng, scoped};
use crate::transforms::ImagePipeline;
use rand::rngs::StdRng;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    Fresh,
    Active,
    Exhausted,
}

/// Owns its own plan, cursor and augmentation RNG. Several iterators over one dataset never
/// share any of them, so a seeded pass augments the same way however iterators interleave.
///
/// Items are `Option<TrainingBatch>`: `None` means the planned batch was rejected (see
/// [`SampleLoader`]) and the caller may skip it. Iteration itself ends with the outer `None`.
///
/// # Example
/// ```ignore
/// let mut batches = dataset.iter()?;
/// for epoch in 0..epochs {
///     if epoch > 0 {
///         batches.start()?;
///     }
///     for batch in batches.by_ref().flatten() {
///         train_step(&batch.images, batch.input_ids()?);
///     }
/// }
/// ```
pub struct DatasetIter<'a> {
    dataset: &'a Dataset,
    pipeline: Option<ImagePipeline>,
    plan: Plan,
    cursor: usize,
    size: usize,
    state: IterState,
    rng: StdRng,
}

impl<'a> DatasetIter<'a> {
    /// A `Fresh` iterator. Yields nothing until [`start`](Self::start) is called.
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            pipeline: None,
            plan: Plan::default(),
            cursor: 0,
            size: 0,
            state: IterState::Fresh,
            rng: pass_rng(0, dataset.runtime_seed()),
        }
    }

    pub fn start(&mut self) -> Result<&mut Self> {
        let config = self.dataset.config();
        let (pass, mut rng) = self.dataset.next_pass();
        self.rng = pass_rng(pass, self.dataset.runtime_seed());

        let pipeline_matches = self
            .pipeline
            .as_ref()
            .is_some_and(|p| p.is_test_mode() == config.test_mode);
        if !pipeline_matches {
            self.pipeline = Some(ImagePipeline::for_test_mode(config.test_mode)?);
        }

        self.plan = BatchPlanner::from_config(config)?.plan(self.dataset.index(), &mut rng);
        self.size = self.dataset.index().full_batches(config.batch_size);
        self.cursor = 0;
        self.state = IterState::Active;

        debug!(
            pass,
            planned = self.plan.len(),
            size = self.size,
            test_mode = config.test_mode,
            "Started dataset pass"
        );
        Ok(self)
    }

    /// Full batches in this pass, the same number as [`Dataset::len`]. When short batches are
    /// kept, the plan holds more entries than this.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> IterState {
        self.state
    }
}

impl Iterator for DatasetIter<'_> {
    type Item = Option<TrainingBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != IterState::Active {
            return None;
        }
        let Some(descriptor) = self.plan.get(self.cursor) else {
            self.state = IterState::Exhausted;
            return None;
        };
        self.cursor += 1;

        let pipeline = self.pipeline.as_ref()?;
        let config = self.dataset.config();
        let canvas = config.pad.then_some(config.max_dimensions);
        let loader = SampleLoader::new(self.dataset.tokenizer(), pipeline, canvas);

        let samples = self.dataset.resolve(descriptor);
        Some(scoped(&mut self.rng, || loader.load(&samples)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.state {
            IterState::Active => self.plan.len().saturating_sub(self.cursor),
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}
