//! Per-sample preprocessing: image pipelines for the two dataset modes and target tokenization.

pub mod core;
pub mod text;
pub mod vision;

pub use self::core::{Chain, Transform};
pub use text::{TargetTokenizer, TokenizeTargets};
pub use vision::ImagePipeline;
