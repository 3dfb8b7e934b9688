use crate::collator::{Collator, PaddingCollator, PaddingRule, StackCollator};
use crate::error::DatasetError;
use crate::features::Features;
use crate::minibatch::{MiniBatch, TrainingBatch};
use crate::sample::{DimensionKey, Sample};
use crate::transforms::text::{TargetTokenizer, TokenizeTargets, PAD_ID};
use crate::transforms::vision::LoadImage;
use crate::transforms::{ImagePipeline, Transform};
use std::path::PathBuf;
use tch::Tensor;
use tracing::{error, warn};

const IMAGE: &str = "image";

/// Turns the samples of one planned batch into a [`TrainingBatch`].
///
/// Failures never propagate out of [`load`](Self::load):
/// - An image that cannot be read, decoded or transformed is logged and its sample dropped
///   from the batch. The rest of the batch is still loaded.
/// - If the remaining images cannot be stacked (or none remain), or tokenization fails, the
///   whole batch is logged and `None` is returned.
///
/// Nothing is retried.
pub struct SampleLoader<'a> {
    tokenizer: &'a dyn TargetTokenizer,
    pipeline: &'a ImagePipeline,
    canvas: Option<DimensionKey>,
    image_loader: LoadImage,
}

impl<'a> SampleLoader<'a> {
    /// `canvas`: when set, stacked images are padded bottom/right to this `(width, height)`
    /// with the pipeline's background value.
    pub fn new(
        tokenizer: &'a dyn TargetTokenizer,
        pipeline: &'a ImagePipeline,
        canvas: Option<DimensionKey>,
    ) -> Self {
        Self {
            tokenizer,
            pipeline,
            canvas,
            image_loader: LoadImage::new(),
        }
    }

    pub fn load(&self, samples: &[&Sample]) -> Option<TrainingBatch> {
        let mut targets = Vec::with_capacity(samples.len());
        let mut images = Vec::with_capacity(samples.len());
        let mut paths = Vec::with_capacity(samples.len());

        for sample in samples {
            let path = sample.image_path().to_path_buf();
            let loaded = self
                .image_loader
                .apply(path.clone())
                .and_then(|img| self.pipeline.apply(img));
            match loaded {
                Ok(tensor) => {
                    images.push(Features::from_single(IMAGE, tensor));
                    targets.push(sample.target().to_string());
                    paths.push(path);
                }
                Err(e) => {
                    let err = DatasetError::UnreadableImage {
                        path,
                        reason: format!("{e:#}"),
                    };
                    warn!(sample = sample.id(), "{err}, excluding from batch");
                }
            }
        }

        if images.is_empty() {
            reject(
                samples.iter().map(|s| s.image_path().to_path_buf()).collect(),
                "no readable images",
            );
            return None;
        }

        let tokens = match self.collate_targets(targets) {
            Ok(tokens) => tokens,
            Err(e) => {
                reject(paths, &format!("{e:#}"));
                return None;
            }
        };

        let images = match self.stack_images(&images) {
            Ok(images) => images,
            Err(e) => {
                reject(paths, &format!("{e:#}"));
                return None;
            }
        };

        Some(TrainingBatch {
            tokens,
            images,
            paths,
        })
    }

    fn collate_targets(&self, targets: Vec<String>) -> anyhow::Result<MiniBatch> {
        let features = TokenizeTargets::new(self.tokenizer).apply(targets)?;
        let mut collator = PaddingCollator::new();
        for name in features[0].names() {
            collator = collator.pad(name, [(0, PaddingRule::MaxLength)], Some(PAD_ID as f64));
        }
        MiniBatch::collate(&features, &collator)
    }

    /// Images of one batch must already agree in shape; the canvas only grows them afterwards.
    fn stack_images(&self, images: &[Features]) -> anyhow::Result<Tensor> {
        let stacked = StackCollator.collate(images)?;
        let Some(canvas) = self.canvas else {
            return Ok(stacked.get(IMAGE)?.shallow_clone());
        };
        let rules = [
            (1, PaddingRule::FixedRight(i64::from(canvas.height))),
            (2, PaddingRule::FixedRight(i64::from(canvas.width))),
        ];
        let padded = PaddingCollator::new()
            .pad(IMAGE, rules, Some(self.pipeline.background()))
            .collate(images)?;
        Ok(padded.get(IMAGE)?.shallow_clone())
    }
}

fn reject(paths: Vec<PathBuf>, reason: &str) {
    let err = DatasetError::BatchAssembly {
        paths,
        reason: reason.to_string(),
    };
    error!("{err}, skipping batch");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::text::{ATTENTION_MASK, INPUT_IDS};
    use anyhow::Result;
    use image::{Rgb, RgbImage};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    struct LenTokenizer;

    impl TargetTokenizer for LenTokenizer {
        fn tokenize(&self, targets: &[String]) -> Result<BTreeMap<String, Vec<Vec<i64>>>> {
            let ids: Vec<Vec<i64>> = targets.iter().map(|t| vec![7; t.len()]).collect();
            let mask = ids.iter().map(|s| vec![1; s.len()]).collect();
            Ok(BTreeMap::from([
                (INPUT_IDS.to_string(), ids),
                (ATTENTION_MASK.to_string(), mask),
            ]))
        }
    }

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> Result<PathBuf> {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255])).save(&path)?;
        Ok(path)
    }

    #[test]
    fn loads_aligned_tokens_and_images() -> Result<()> {
        let dir = tempdir()?;
        let a = Sample::new(0, "ab", write_png(dir.path(), "0.png", 5, 3)?);
        let b = Sample::new(1, "abcd", write_png(dir.path(), "1.png", 5, 3)?);
        let pipeline = ImagePipeline::test();
        let loader = SampleLoader::new(&LenTokenizer, &pipeline, None);

        let batch = loader.load(&[&a, &b]).ok_or_else(|| anyhow::anyhow!("batch rejected"))?;
        assert_eq!(batch.images.size(), vec![2, 1, 3, 5]);
        let ids: Vec<i64> = batch.input_ids()?.get(0).try_into()?;
        assert_eq!(ids, vec![1, 7, 7, 2, 0, 0]);
        let mask: Vec<i64> = batch.tokens.get(ATTENTION_MASK)?.get(1).try_into()?;
        assert_eq!(mask, vec![1; 6]);
        Ok(())
    }

    #[test]
    fn excludes_unreadable_images() -> Result<()> {
        let dir = tempdir()?;
        let good = Sample::new(0, "ab", write_png(dir.path(), "0.png", 4, 4)?);
        let corrupt_path = dir.path().join("1.png");
        fs::write(&corrupt_path, b"garbage")?;
        let corrupt = Sample::new(1, "abc", corrupt_path);
        let missing = Sample::new(2, "a", dir.path().join("2.png"));

        let pipeline = ImagePipeline::test();
        let loader = SampleLoader::new(&LenTokenizer, &pipeline, None);
        let batch = loader
            .load(&[&good, &corrupt, &missing])
            .ok_or_else(|| anyhow::anyhow!("batch rejected"))?;
        assert_eq!(batch.batch_size(), 1);
        assert_eq!(batch.paths, vec![good.image_path().to_path_buf()]);
        assert_eq!(batch.input_ids()?.size(), vec![1, 4]);
        Ok(())
    }

    #[test]
    fn rejects_inconsistent_shapes_and_empty_batches() -> Result<()> {
        let dir = tempdir()?;
        let a = Sample::new(0, "a", write_png(dir.path(), "0.png", 4, 4)?);
        let b = Sample::new(1, "b", write_png(dir.path(), "1.png", 6, 4)?);
        let missing = Sample::new(2, "c", dir.path().join("2.png"));

        let pipeline = ImagePipeline::test();
        let loader = SampleLoader::new(&LenTokenizer, &pipeline, None);
        assert!(loader.load(&[&a, &b]).is_none());
        assert!(loader.load(&[&missing]).is_none());
        Ok(())
    }

    #[test]
    fn pads_to_canvas_with_background() -> Result<()> {
        let dir = tempdir()?;
        let a = Sample::new(0, "a", write_png(dir.path(), "0.png", 4, 3)?);
        let pipeline = ImagePipeline::test();
        let loader = SampleLoader::new(&LenTokenizer, &pipeline, Some(DimensionKey::new(8, 6)));

        let batch = loader.load(&[&a]).ok_or_else(|| anyhow::anyhow!("batch rejected"))?;
        assert_eq!(batch.images.size(), vec![1, 1, 6, 8]);
        let corner = batch.images.double_value(&[0, 0, 5, 7]);
        assert!((corner - pipeline.background()).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn canvas_padding_still_rejects_mixed_shapes() -> Result<()> {
        let dir = tempdir()?;
        let a = Sample::new(0, "a", write_png(dir.path(), "0.png", 4, 3)?);
        let b = Sample::new(1, "b", write_png(dir.path(), "1.png", 5, 3)?);
        let pipeline = ImagePipeline::test();
        let loader = SampleLoader::new(&LenTokenizer, &pipeline, Some(DimensionKey::new(8, 6)));

        assert!(loader.load(&[&a, &b]).is_none());
        Ok(())
    }
}
