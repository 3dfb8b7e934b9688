#![allow(dead_code)]

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use markup_dataset::{AbortSignal, Dataset, DatasetConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokenizers::Tokenizer;

/// WordLevel tokenizer over the symbols used in these tests:
/// `x`=4 `^`=5 `2`=6 `y`=7 `=`=8 `mc`=9 `a`=10 `+`=11 `b`=12, with [PAD]/[BOS]/[EOS] = 0/1/2.
pub fn tokenizer_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tokenizer.json")
}

pub fn tokenizer() -> Result<Tokenizer> {
    Tokenizer::from_file(tokenizer_path()).map_err(|e| anyhow!("Failed to load tokenizer: {}", e))
}

/// A targets file and an image directory living in a temp dir.
pub struct Fixture {
    pub dir: TempDir,
    pub targets: PathBuf,
    pub images: PathBuf,
}

impl Fixture {
    pub fn new(targets: &[&str], images: &[(&str, u32, u32)]) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let targets_path = dir.path().join("targets.txt");
        fs::write(&targets_path, targets.join("\n") + "\n")?;

        let images_dir = dir.path().join("images");
        fs::create_dir(&images_dir)?;
        for &(name, w, h) in images {
            write_png(&images_dir.join(name), w, h)?;
        }
        Ok(Self {
            dir,
            targets: targets_path,
            images: images_dir,
        })
    }

    /// `"x^2", "y=mc^2", "a+b"` with `0.png` and `1.png` at 10x10 and `2.png` at 20x20.
    pub fn three_formulas() -> Result<Self> {
        Self::new(
            &["x^2", "y=mc^2", "a+b"],
            &[("0.png", 10, 10), ("1.png", 10, 10), ("2.png", 20, 20)],
        )
    }

    /// `n` targets, alternating between 8x8 and 12x6 images.
    pub fn many(n: usize) -> Result<Self> {
        let targets: Vec<String> = (0..n).map(|i| format!("a+b^{i}")).collect();
        let names: Vec<String> = (0..n).map(|i| format!("{i}.png")).collect();
        let images: Vec<(&str, u32, u32)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (w, h) = if i % 2 == 0 { (8, 8) } else { (12, 6) };
                (name.as_str(), w, h)
            })
            .collect();
        let targets: Vec<&str> = targets.iter().map(String::as_str).collect();
        Self::new(&targets, &images)
    }

    pub fn image(&self, name: &str) -> PathBuf {
        self.images.join(name)
    }

    pub fn build(&self, config: DatasetConfig) -> markup_dataset::Result<Dataset> {
        Dataset::from_files(
            &self.targets,
            &self.images,
            &tokenizer_path(),
            config,
            &AbortSignal::new(),
        )
    }
}

/// Writes an all-white RGB PNG.
pub fn write_png(path: &Path, width: u32, height: u32) -> Result<()> {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255])).save(path)?;
    Ok(())
}

/// Config with the given batch size, deterministic order and everything else at defaults.
pub fn sequential(batch_size: usize) -> Result<DatasetConfig> {
    Ok(DatasetConfig::builder()
        .batch_size(batch_size)
        .shuffle(false)
        .max_dimensions((100, 100))
        .build()?)
}
