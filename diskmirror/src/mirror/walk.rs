use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("source path not found: {0:?}")]
    SourceNotFound(PathBuf),
    #[error("failed to resolve source path {path:?}: {source}")]
    Canonicalize { path: PathBuf, source: io::Error },
    #[error("source path {0:?} has no name to mirror under")]
    Unnamed(PathBuf),
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntity {
    pub path: PathBuf,
    pub parent: PathBuf,
}

/// Result of walking the source once. Directories come parent-first, the
/// source root (when it is a directory) always leads. Which list an entity
/// sits in is its kind.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub root: PathBuf,
    pub directories: Vec<LocalEntity>,
    pub files: Vec<LocalEntity>,
}

impl Discovery {
    /// Local directory whose remote container is the mirror destination.
    pub fn anchor(&self) -> &Path {
        self.root.parent().unwrap_or(&self.root)
    }
}

pub fn discover(source: &Path) -> Result<Discovery, WalkError> {
    let root = match std::fs::canonicalize(source) {
        Ok(root) => root,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(WalkError::SourceNotFound(source.to_path_buf()));
        }
        Err(source_err) => {
            return Err(WalkError::Canonicalize {
                path: source.to_path_buf(),
                source: source_err,
            });
        }
    };

    if root.file_name().is_none() {
        return Err(WalkError::Unnamed(root));
    }

    let mut discovery = Discovery {
        root: root.clone(),
        ..Discovery::default()
    };

    if !root.is_dir() {
        discovery.files.push(entity(&root));
        return Ok(discovery);
    }

    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            discovery.directories.push(entity(entry.path()));
        } else if file_type.is_file() {
            discovery.files.push(entity(entry.path()));
        } else {
            tracing::debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }
    Ok(discovery)
}

fn entity(path: &Path) -> LocalEntity {
    LocalEntity {
        path: path.to_path_buf(),
        parent: path.parent().unwrap_or(path).to_path_buf(),
    }
}
