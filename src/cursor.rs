//! Block cursor persistence.
//!
//! The cursor records the height of the last fully processed block, enabling
//! the stream to resume after restarts. It is written after every block, so a
//! crash loses at most one in-flight block.

use std::path::{Path, PathBuf};

/// File-backed cursor over the last processed block height.
#[derive(Debug, Clone)]
pub struct BlockCursor {
    path: PathBuf,
    height: u64,
}

impl BlockCursor {
    /// Load the cursor from a file.
    ///
    /// Returns height 0 (meaning "start from the current tip") if the file is
    /// missing or unparseable.
    pub fn load(path: &Path) -> Self {
        let height = match std::fs::read_to_string(path) {
            Ok(content) => match content.trim().parse::<u64>() {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!("Cursor file {:?} is unparseable ({}), starting at 0", path, e);
                    0
                }
            },
            Err(e) => {
                tracing::info!("No cursor file at {:?} ({}), starting at 0", path, e);
                0
            }
        };

        Self {
            path: path.to_path_buf(),
            height,
        }
    }

    /// The last fully processed block height (0 = nothing processed yet).
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Override the height in memory without persisting.
    ///
    /// Used for explicit "start from height N" requests; the file is only
    /// rewritten once the next block is processed.
    pub fn set_height(&mut self, height: u64) {
        self.height = height;
    }

    /// Advance the cursor and persist it.
    ///
    /// Uses atomic write (write to temp file, then rename) to prevent
    /// corruption. The in-memory height advances even if the write fails, so
    /// one failed write does not stall the stream; the error is returned for
    /// the caller to log.
    pub fn advance(&mut self, height: u64) -> anyhow::Result<()> {
        self.height = height;

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, height.to_string())?;
        std::fs::rename(&temp_path, &self.path)?;

        tracing::debug!("Cursor advanced to {}", height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let cursor = BlockCursor::load(&dir.path().join("nope.txt"));
        assert_eq!(cursor.height(), 0);
    }

    #[test]
    fn test_advance_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_block.txt");

        let mut cursor = BlockCursor::load(&path);
        cursor.advance(1000).unwrap();

        let reloaded = BlockCursor::load(&path);
        assert_eq!(reloaded.height(), 1000);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1000");
    }

    #[test]
    fn test_load_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_block.txt");
        std::fs::write(&path, "not a number").unwrap();

        let cursor = BlockCursor::load(&path);
        assert_eq!(cursor.height(), 0);
    }

    #[test]
    fn test_in_memory_height_advances_on_write_failure() {
        // Point at a directory that does not exist so the write fails.
        let mut cursor = BlockCursor {
            path: PathBuf::from("/nonexistent-dir-for-test/cursor.txt"),
            height: 5,
        };
        assert!(cursor.advance(6).is_err());
        assert_eq!(cursor.height(), 6);
    }
}
