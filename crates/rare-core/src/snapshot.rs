use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Reference to a restart snapshot written by an external MD engine.
///
/// Snapshots are immutable once written: steppers always write a new file, so
/// cloning a `Snapshot` is a logical copy of the physical state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    /// Wraps the path of an existing restart file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File extension of the snapshot, if any.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }

    /// Returns true when the snapshot file exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for Snapshot {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}
