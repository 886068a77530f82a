use thiserror::Error;

use super::backoff::RetryPolicy;
use super::remote::{EntryKind, RemoteError, RemoteStore};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{count} remote entries named {name:?} under {}", .parent.as_deref().unwrap_or("<root>"))]
    Ambiguous {
        parent: Option<String>,
        name: String,
        count: usize,
    },
    #[error("transient query error: {0}")]
    TransientQuery(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl From<RemoteError> for ResolveError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transient(msg) => ResolveError::TransientQuery(msg),
            RemoteError::Failed(msg) => ResolveError::Query(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub id: String,
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedEntry),
    NotFound,
}

/// Answers "does `name` exist under `parent`?" against a [`RemoteStore`].
pub struct Resolver<'a, S> {
    store: &'a S,
    retry: RetryPolicy,
}

impl<'a, S: RemoteStore> Resolver<'a, S> {
    pub fn new(store: &'a S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Single attempt. More than one match under the same parent is never
    /// guessed at.
    pub async fn resolve(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<Resolution, ResolveError> {
        let entries = self.store.list(parent, name).await?;
        let mut matches = Vec::new();
        for entry in entries.into_iter().filter(|entry| entry.name == name) {
            let Some(parent) = parent else {
                matches.push((entry, None));
                continue;
            };
            match entry.parent_id.as_deref() {
                Some(known) if known == parent => matches.push((entry, None)),
                Some(_) => {}
                None => {
                    let info = self.store.info(&entry.id).await?;
                    if info.parent_id.as_deref() == Some(parent) {
                        matches.push((entry, Some(info.path)));
                    }
                }
            }
        }

        if matches.len() > 1 {
            return Err(ResolveError::Ambiguous {
                parent: parent.map(str::to_string),
                name: name.to_string(),
                count: matches.len(),
            });
        }
        let Some((entry, path)) = matches.pop() else {
            return Ok(Resolution::NotFound);
        };
        let path = match path.or(entry.path) {
            Some(path) => path,
            None => self.store.info(&entry.id).await?.path,
        };
        Ok(Resolution::Found(ResolvedEntry {
            id: entry.id,
            path,
            kind: entry.kind,
        }))
    }

    /// [`resolve`](Self::resolve) with transient failures retried under the
    /// configured policy.
    pub async fn resolve_with_retry(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<Resolution, ResolveError> {
        let mut attempt = 0u32;
        loop {
            match self.resolve(parent, name).await {
                Err(ResolveError::TransientQuery(msg)) if self.retry.allows_retry(attempt) => {
                    tracing::debug!(name, attempt, error = %msg, "retrying remote lookup");
                    self.retry.pause(attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
