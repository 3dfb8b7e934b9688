use crate::transforms::Transform;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::PathBuf;

// ============================================================================
// LoadImage
// ============================================================================

/// Reads and fully decodes an image file.
///
/// The format is guessed from the file contents rather than the extension. A missing file, a
/// truncated file and a corrupt file all come back as an error naming the path.
///
/// # Example
/// ```ignore
/// let image = LoadImage::new().apply(PathBuf::from("data/images/12.png"))?;
/// ```
#[derive(Debug, Clone)]
pub struct LoadImage {
    buffer_size: usize,
}

impl LoadImage {
    /// Creates a loader with an 8KB read buffer.
    pub fn new() -> Self {
        Self { buffer_size: 8192 }
    }
}

impl Default for LoadImage {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform<PathBuf, DynamicImage> for LoadImage {
    fn apply(&self, path: PathBuf) -> Result<DynamicImage> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;

        let file_size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = Vec::with_capacity(file_size);
        reader
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        ImageReader::new(Cursor::new(buffer))
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn decodes_png_files() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("0.png");
        RgbImage::new(7, 3).save(&path)?;

        let image = LoadImage::new().apply(path)?;
        assert_eq!(image.dimensions(), (7, 3));
        Ok(())
    }

    #[test]
    fn reports_missing_and_corrupt_files() -> Result<()> {
        let dir = tempdir()?;
        let missing = LoadImage::new().apply(dir.path().join("404.png"));
        assert!(missing.is_err());

        let corrupt = dir.path().join("1.png");
        fs::write(&corrupt, b"not a png")?;
        let err = LoadImage::new().apply(corrupt).unwrap_err();
        assert!(err.to_string().contains("1.png"));
        Ok(())
    }
}
