use super::DataSource;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists the image files directly inside a directory, filtered by extension.
///
/// Only paths are produced; nothing is opened or decoded here. Paths come back with `/`
/// separators regardless of platform, so indexes built on one machine stay valid on another.
///
/// # Example
/// ```ignore
/// let source = ImageDirSource::png("./data/images");
/// let mut paths = source.read_all()?;
/// paths.sort();
/// ```
pub struct ImageDirSource {
    dir_path: PathBuf,
    extensions: Vec<String>,
}

impl ImageDirSource {
    /// # Arguments
    /// - `dir_path`: Directory to scan.
    /// - `extensions`: File extensions to include (e.g., `["png"]`). Case-insensitive.
    pub fn new(dir_path: impl Into<PathBuf>, extensions: &[&str]) -> Self {
        Self {
            dir_path: dir_path.into(),
            extensions: extensions.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// `*.png` files, the layout rendered formula datasets use.
    pub fn png(dir_path: impl Into<PathBuf>) -> Self {
        Self::new(dir_path, &["png"])
    }
}

/// Replaces Windows separators with `/`.
pub fn normalize_separators(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace('\\', "/"))
}

impl DataSource<PathBuf> for ImageDirSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + Send>> {
        let dir_metadata = fs::metadata(&self.dir_path)
            .with_context(|| format!("Failed to access directory: {}", self.dir_path.display()))?;
        if !dir_metadata.is_dir() {
            bail!("Path is not a directory: {}", self.dir_path.display());
        }

        let extensions = self.extensions.clone();
        let iter = WalkDir::new(&self.dir_path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        return None;
                    }
                    let extension_matches = entry
                        .path()
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| extensions.contains(&e.to_lowercase()));
                    extension_matches.then(|| Ok(normalize_separators(entry.path())))
                }
                Err(e) => Some(Err(e).context("Failed to read directory entry")),
            });
        Ok(Box::new(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn lists_top_level_files_by_extension() -> Result<()> {
        let dir = tempdir()?;
        let d = dir.path();
        File::create(d.join("0.png"))?;
        File::create(d.join("1.PNG"))?;
        File::create(d.join("notes.txt"))?;
        fs::create_dir(d.join("nested"))?;
        File::create(d.join("nested").join("2.png"))?;

        let mut files = ImageDirSource::png(d).read_all()?;
        files.sort();
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .collect();
        assert_eq!(names, vec!["0.png", "1.PNG"]);

        let with_text = ImageDirSource::new(d, &["png", "txt"]).read_all()?;
        assert_eq!(with_text.len(), 3);
        Ok(())
    }

    #[test]
    fn missing_directory_is_an_error() {
        let source = ImageDirSource::png("/definitely/not/here");
        assert!(source.stream().is_err());
    }

    #[test]
    fn normalizes_backslashes() {
        let path = normalize_separators(Path::new(r"data\images\12.png"));
        assert_eq!(path, PathBuf::from("data/images/12.png"));
    }
}
