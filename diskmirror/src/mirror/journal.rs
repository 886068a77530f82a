//! Append-only record of local files already confirmed on the remote side.
//!
//! One absolute path per line. Entries are buffered and appended every
//! `batch_size` records, so a crash loses at most one batch; those files are
//! re-verified against the remote on the next run.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to read journal {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to append to journal {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Default)]
struct JournalState {
    pending: Vec<String>,
    seen: HashSet<PathBuf>,
}

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    batch_size: usize,
    state: Mutex<JournalState>,
}

impl Journal {
    /// Reads the skip set. A missing journal is an empty one.
    pub async fn load(path: &Path) -> Result<HashSet<PathBuf>, JournalError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(source) => {
                return Err(JournalError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        // Only the `\n` terminator is stripped; anything else on the line is
        // part of the path.
        Ok(contents
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// `known` is the set returned by [`load`](Self::load); those paths are
    /// never appended again.
    pub fn open(path: impl Into<PathBuf>, batch_size: usize, known: HashSet<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batch_size: batch_size.max(1),
            state: Mutex::new(JournalState {
                pending: Vec::new(),
                seen: known,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent. Flushes when the buffer reaches the batch size.
    ///
    /// Paths that cannot be written back as a single line are left out, so
    /// the next run checks them against the remote again.
    pub async fn record(&self, path: &Path) -> Result<(), JournalError> {
        let Some(line) = journal_line(path) else {
            tracing::warn!(
                path = %path.display(),
                "path cannot be journaled; it will be re-checked next run"
            );
            return Ok(());
        };
        let mut state = self.state.lock().await;
        if !state.seen.insert(path.to_path_buf()) {
            return Ok(());
        }
        state.pending.push(line.to_string());
        if state.pending.len() >= self.batch_size {
            self.write_pending(&mut state).await?;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), JournalError> {
        let mut state = self.state.lock().await;
        self.write_pending(&mut state).await
    }

    #[cfg(test)]
    async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    async fn write_pending(&self, state: &mut JournalState) -> Result<(), JournalError> {
        if state.pending.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for line in &state.pending {
            buf.push_str(line);
            buf.push('\n');
        }
        self.append(buf.as_bytes())
            .await
            .map_err(|source| JournalError::Write {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!(
            journal = %self.path.display(),
            entries = state.pending.len(),
            "journal batch flushed"
        );
        state.pending.clear();
        Ok(())
    }

    async fn append(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_data().await
    }
}

fn journal_line(path: &Path) -> Option<&str> {
    path.to_str().filter(|line| !line.is_empty() && !line.contains('\n'))
}
