use super::DataSource;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Reads a text file line by line.
///
/// Blank lines are kept: in a targets file the line number is the sample identifier, so
/// dropping a line would shift every target after it.
///
/// # Example
/// ```ignore
/// let targets = TxtSource::new("data/formulas.txt").read_all()?;
/// assert_eq!(targets[12], "y=mc^2");
/// ```
pub struct TxtSource {
    path: PathBuf,
}

impl TxtSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataSource<String> for TxtSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<String>> + Send>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open text file: {}", self.path.display()))?;

        let iter = BufReader::new(file)
            .lines()
            .enumerate()
            .map(|(line_num, line)| {
                line.with_context(|| format!("Error reading line {}", line_num + 1))
            });
        Ok(Box::new(iter))
    }
}
