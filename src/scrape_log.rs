use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app::Result;
use crate::domain::LogEntry;

/// Append-only record of processed candidates, one line each.
///
/// With `max_bytes` set, a file that has grown past the limit is moved to
/// `<name>.1` before the next append. Without it the file grows unbounded.
#[derive(Debug, Clone)]
pub struct ScrapeLog {
    path: PathBuf,
    max_bytes: Option<u64>,
}

impl ScrapeLog {
    pub fn new(path: impl Into<PathBuf>, max_bytes: Option<u64>) -> Self {
        Self {
            path: path.into(),
            max_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, product_id: i64, barcode: &str, success: bool, message: &str) -> Result<()> {
        self.append(&LogEntry::new(product_id, barcode, success, message))
    }

    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;

        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let Some(max_bytes) = self.max_bytes else {
            return Ok(());
        };

        match fs::metadata(&self.path) {
            Ok(meta) if meta.len() >= max_bytes => {
                fs::rename(&self.path, self.rotated_path())?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn rotated_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".1");
        self.path.with_file_name(name)
    }
}
