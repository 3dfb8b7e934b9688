use crate::config::{ConfigUpdate, DatasetConfig};
use crate::error::{DatasetError, Result};
use crate::index::{AbortSignal, DimensionIndex};
use crate::iterator::DatasetIter;
use crate::planner::{BatchDescriptor, BatchPlanner, Plan};
use crate::readers::{DataSource, ImageDirSource, TxtSource};
use crate::sample::Sample;
use crate::transforms::text::unpadded;
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Image/markup samples bucketed by exact image size, plus everything needed to batch them.
///
/// A `Dataset` owns the [`DimensionIndex`], the current [`DatasetConfig`], the tokenizer and the
/// current [`Plan`]. The index is read-only while iterating, so any number of
/// [`DatasetIter`]s can run over one dataset; each gets its own plan and cursor.
///
/// # Size
/// [`len`](Self::len) counts only full batches: `sum(floor(bucket_len / batch_size))`. With
/// `keep_smaller_batches`, a pass yields up to one extra short batch per bucket on top of that.
/// [`plan_len`](Self::plan_len) gives the true number of planned batches.
///
/// # Persistence
/// [`save`](Self::save) writes the index, configuration, sample count and tokenizer as one JSON
/// document. The plan and runtime seed are not stored; [`load`](Self::load) rebuilds them.
#[derive(Serialize, Deserialize)]
pub struct Dataset {
    index: DimensionIndex,
    config: DatasetConfig,
    /// Image files found when the dataset was built, bucketed or not
    sample_size: usize,
    tokenizer: Tokenizer,
    #[serde(skip)]
    size: usize,
    #[serde(skip)]
    plan: Plan,
    #[serde(skip)]
    pass: AtomicUsize,
    #[serde(skip)]
    runtime_seed: u64,
}

impl Dataset {
    /// Wraps an existing index. Buckets outside `config.max_dimensions` are dropped, and any
    /// padding or truncation configured in `tokenizer` is cleared.
    pub fn from_index(
        mut index: DimensionIndex,
        tokenizer: Tokenizer,
        config: DatasetConfig,
    ) -> Result<Self> {
        config.validate()?;
        let tokenizer = clear_padding(tokenizer)?;
        index.retain_within(config.max_dimensions);
        let sample_size = index.num_samples();
        let mut dataset = Self {
            index,
            config,
            sample_size,
            tokenizer,
            size: 0,
            plan: Plan::default(),
            pass: AtomicUsize::new(0),
            runtime_seed: 0,
        };
        dataset.refresh()?;
        Ok(dataset)
    }

    /// Builds a dataset from a targets file (one target per line), a directory of `*.png`
    /// images named `<line number>.png`, and a serialized tokenizer.
    pub fn from_files(
        targets: &Path,
        images: &Path,
        tokenizer: &Path,
        config: DatasetConfig,
        abort: &AbortSignal,
    ) -> Result<Self> {
        Self::from_files_inner(targets, images, tokenizer, config, abort, None)
    }

    /// Same as [`from_files`](Self::from_files), reporting scan progress on `progress`.
    pub fn from_files_with_progress(
        targets: &Path,
        images: &Path,
        tokenizer: &Path,
        config: DatasetConfig,
        abort: &AbortSignal,
        progress: &ProgressBar,
    ) -> Result<Self> {
        Self::from_files_inner(targets, images, tokenizer, config, abort, Some(progress))
    }

    fn from_files_inner(
        targets: &Path,
        images: &Path,
        tokenizer: &Path,
        config: DatasetConfig,
        abort: &AbortSignal,
        progress: Option<&ProgressBar>,
    ) -> Result<Self> {
        config.validate()?;
        let tokenizer = load_tokenizer(tokenizer)?;
        let targets = TxtSource::new(targets).read_all()?;
        let mut image_paths = ImageDirSource::png(images).read_all()?;
        image_paths.sort();
        info!(
            targets = targets.len(),
            images = image_paths.len(),
            "Indexing dataset sources"
        );

        let index = match progress {
            Some(pb) => {
                pb.set_length(image_paths.len() as u64);
                let index = DimensionIndex::build_with_progress(
                    &targets,
                    &image_paths,
                    config.max_dimensions,
                    abort,
                    pb,
                )?;
                pb.finish();
                index
            }
            None => DimensionIndex::build(&targets, &image_paths, config.max_dimensions, abort)?,
        };

        let mut dataset = Self::from_index(index, tokenizer, config)?;
        dataset.sample_size = image_paths.len();
        Ok(dataset)
    }

    /// Number of full batches (see the type-level docs on size).
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Batches in the current plan, short batches included.
    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn index(&self) -> &DimensionIndex {
        &self.index
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn runtime_seed(&self) -> u64 {
        self.runtime_seed
    }

    /// The samples a descriptor points at, in planned order.
    pub fn resolve(&self, batch: &BatchDescriptor) -> Vec<&Sample> {
        let Some(bucket) = self.index.get(&batch.key) else {
            return Vec::new();
        };
        batch
            .positions
            .iter()
            .filter_map(|&pos| bucket.samples().get(pos))
            .collect()
    }

    /// Returns a started iterator over the batches of a new pass.
    pub fn iter(&self) -> Result<DatasetIter<'_>> {
        let mut iter = DatasetIter::new(self);
        iter.start()?;
        Ok(iter)
    }

    /// Applies `update` and replans.
    ///
    /// The update is validated first; on error the dataset is unchanged. A new
    /// `max_dimensions` drops buckets that no longer fit. Buckets dropped this way are gone
    /// for good, even if a later update raises the cap again.
    pub fn update(&mut self, update: ConfigUpdate) -> Result<()> {
        let next = self.config.apply(&update)?;
        if next.max_dimensions != self.config.max_dimensions {
            let dropped = self.index.retain_within(next.max_dimensions);
            info!(dropped, max = %next.max_dimensions, "Applied new dimension cap");
        }
        self.config = next;
        self.size = self.index.full_batches(self.config.batch_size);
        self.replan()?;
        debug!(?update, size = self.size, planned = self.plan.len(), "Reconfigured dataset");
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!(path = %path.display(), samples = self.index.num_samples(), "Saved dataset");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut dataset: Self = serde_json::from_reader(reader)?;
        dataset.config.validate()?;
        dataset.tokenizer = clear_padding(dataset.tokenizer)?;
        dataset.refresh()?;
        Ok(dataset)
    }

    /// Hands out the next pass number with the shuffle RNG for it.
    pub(crate) fn next_pass(&self) -> (usize, StdRng) {
        let pass = self.pass.fetch_add(1, Ordering::SeqCst);
        let rng = StdRng::seed_from_u64(self.runtime_seed.wrapping_add(pass as u64));
        (pass, rng)
    }

    /// Recomputes everything not persisted: runtime seed, size and plan.
    fn refresh(&mut self) -> Result<()> {
        self.runtime_seed = self.config.seed.unwrap_or_else(|| rand::rng().random());
        self.size = self.index.full_batches(self.config.batch_size);
        self.replan()
    }

    fn replan(&mut self) -> Result<()> {
        let (_, mut rng) = self.next_pass();
        self.plan = BatchPlanner::from_config(&self.config)?.plan(&self.index, &mut rng);
        Ok(())
    }
}

fn clear_padding(tokenizer: Tokenizer) -> Result<Tokenizer> {
    unpadded(tokenizer).map_err(|e| DatasetError::Tokenizer(format!("{e:#}")))
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| DatasetError::Tokenizer(format!("Failed to load {}: {}", path.display(), e)))
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("config", &self.config)
            .field("buckets", &self.index.num_buckets())
            .field("samples", &self.index.num_samples())
            .field("sample_size", &self.sample_size)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
