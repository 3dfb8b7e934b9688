//! Image transforms, from file bytes to a normalized single-channel tensor.
//!
//! ```text
//! transforms/vision/
//! ├── io.rs            → LoadImage
//! ├── color.rs         → EnsureRGB, ToGray
//! ├── augmentation.rs  → random pixel-level augmentations (train mode only)
//! ├── conversion.rs    → ToTensor, FirstChannel
//! ├── photometric.rs   → Normalize
//! └── pipeline.rs      → ImagePipeline: the train and test compositions
//! ```
//!
//! No transform here changes an image's width or height, so every tensor in a bucket-planned
//! batch keeps the bucket's exact dimensions.

pub mod augmentation;
pub mod color;
pub mod conversion;
pub mod io;
pub mod photometric;
pub mod pipeline;

pub use augmentation::{
    RandomBrightnessContrast, RandomGaussNoise, RandomInvert, RandomJpegCompression, RandomRgbShift,
};
pub use color::{EnsureRGB, ToGray};
pub use conversion::{FirstChannel, ToTensor};
pub use io::LoadImage;
pub use photometric::Normalize;
pub use pipeline::ImagePipeline;
