//! Raw dataset inputs: the image directory and the line-delimited targets file.

pub mod image_dir;
pub mod txt;

pub use image_dir::ImageDirSource;
pub use txt::TxtSource;

use anyhow::Result;

/// A source of raw records, streamed lazily.
///
/// Each item is its own `Result` so a single unreadable entry can be reported without
/// losing the rest of the stream.
pub trait DataSource<T>: Send + Sync {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<T>> + Send>>;

    /// Collects the whole stream, failing on the first bad entry.
    fn read_all(&self) -> Result<Vec<T>> {
        self.stream()?.collect()
    }
}
