use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Counts successful conversions. Callers treat failures as non-fatal.
#[cfg_attr(test, mockall::automock)]
pub trait UsageCounter {
    /// Increment the counter and return the new total.
    fn increment_and_fetch(&self) -> Result<u64>;
}

/// Counter persisted as a decimal number in a text file.
#[derive(Debug, Clone)]
pub struct FileUsageCounter {
    path: Utf8PathBuf,
}

impl FileUsageCounter {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Current total without incrementing; a missing file reads as zero.
    pub fn current(&self) -> Result<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read usage counter: {}", self.path))?;
        text.trim()
            .parse()
            .with_context(|| format!("Usage counter is not a number: {}", self.path))
    }
}

impl UsageCounter for FileUsageCounter {
    fn increment_and_fetch(&self) -> Result<u64> {
        let next = self.current()? + 1;

        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent))?;
            }
        }
        fs::write(&self.path, next.to_string())
            .with_context(|| format!("Failed to write usage counter: {}", self.path))?;

        tracing::debug!("Usage counter now {}", next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn counter_in(dir: &TempDir) -> FileUsageCounter {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nested").join("usage_count"))
            .unwrap();
        FileUsageCounter::new(path)
    }

    #[test]
    fn test_counts_from_zero() {
        let dir = TempDir::new().unwrap();
        let counter = counter_in(&dir);

        assert_eq!(counter.current().unwrap(), 0);
        assert_eq!(counter.increment_and_fetch().unwrap(), 1);
        assert_eq!(counter.increment_and_fetch().unwrap(), 2);
        assert_eq!(counter.current().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let counter = counter_in(&dir);
        fs::create_dir_all(counter.path().parent().unwrap()).unwrap();
        fs::write(counter.path(), "not a number").unwrap();

        assert!(counter.increment_and_fetch().is_err());
    }

    #[test]
    fn test_mock_counter() {
        let mut mock = MockUsageCounter::new();
        mock.expect_increment_and_fetch().times(1).returning(|| Ok(7));
        assert_eq!(mock.increment_and_fetch().unwrap(), 7);
    }
}
