//! Error taxonomy for index building, batch assembly and reconfiguration.
//!
//! Only `MalformedDataset`, `InvalidConfiguration` and the plumbing variants are ever returned
//! to callers. `UnreadableImage` and `BatchAssembly` are constructed so they can be logged with a
//! uniform message; the loader recovers from them by excluding a sample or rejecting a batch.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The image filename stems and the targets file disagree.
    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("Unreadable image {}: {reason}", path.display())]
    UnreadableImage { path: PathBuf, reason: String },

    #[error("Cannot assemble batch from images [{}]: {reason}", join_paths(paths))]
    BatchAssembly { paths: Vec<PathBuf>, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Failed to read dataset sources: {0:#}")]
    Source(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize dataset: {0}")]
    Persistence(#[from] serde_json::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub type Result<T> = std::result::Result<T, DatasetError>;
