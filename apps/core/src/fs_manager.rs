use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk layout of the service data.
///
/// ```text
/// <root>/
///   db/gyaanforge.sqlite
///   logs/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir().join("gyaanforge.sqlite")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Creates every directory of the layout that does not exist yet.
    pub fn init(&self) -> Result<(), std::io::Error> {
        for dir in [self.root.clone(), self.db_dir(), self.logs_dir()] {
            if !dir.exists() {
                info!("Creating directory: {:?}", dir);
                fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
