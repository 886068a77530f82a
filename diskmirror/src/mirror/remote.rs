//! Call contract between the mirror core and a storage service.
//!
//! Identifiers are opaque strings owned by the service. `None` as a parent
//! stands for the service's root container.

use std::future::Future;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    /// Unix seconds, when the service reports it.
    pub modified: Option<i64>,
    /// Known parent id; `None` means it has to be discovered with `info`.
    pub parent_id: Option<String>,
    /// Canonical path, when the listing already carries it.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub parent_id: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    pub total_space: u64,
    pub used_space: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transient remote failure: {0}")]
    Transient(String),
    #[error("remote failure: {0}")]
    Failed(String),
}

pub trait RemoteStore: Send + Sync {
    fn about(&self) -> impl Future<Output = Result<ServiceHealth, RemoteError>> + Send;

    /// Entries named `name` under `parent`. The result may contain more than
    /// one entry; callers decide what that means.
    fn list(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> impl Future<Output = Result<Vec<RemoteEntry>, RemoteError>> + Send;

    fn info(&self, id: &str) -> impl Future<Output = Result<EntryInfo, RemoteError>> + Send;

    /// Creates a container and returns its id.
    fn mkdir(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> impl Future<Output = Result<String, RemoteError>> + Send;

    fn upload(
        &self,
        local_path: &Path,
        parent_id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
