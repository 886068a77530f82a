use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathMapError {
    #[error("parent of {0:?} has no remote container")]
    ParentNotResolved(PathBuf),
    #[error("{path:?} already maps to {existing}, refusing {attempted}")]
    Conflict {
        path: PathBuf,
        existing: String,
        attempted: String,
    },
}

/// Local absolute directory path -> remote container id.
///
/// Entries are write-once. The directory phase owns the map mutably; the
/// upload phase only ever sees a shared reference.
#[derive(Debug, Default)]
pub struct PathMapper {
    entries: HashMap<PathBuf, String>,
}

impl PathMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(
        &mut self,
        path: impl Into<PathBuf>,
        id: impl Into<String>,
    ) -> Result<(), PathMapError> {
        let path = path.into();
        let id = id.into();
        match self.entries.get(&path) {
            Some(existing) if *existing == id => Ok(()),
            Some(existing) => Err(PathMapError::Conflict {
                existing: existing.clone(),
                attempted: id,
                path,
            }),
            None => {
                self.entries.insert(path, id);
                Ok(())
            }
        }
    }

    pub fn get(&self, path: &Path) -> Result<&str, PathMapError> {
        self.entries
            .get(path)
            .map(String::as_str)
            .ok_or_else(|| PathMapError::ParentNotResolved(path.to_path_buf()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
