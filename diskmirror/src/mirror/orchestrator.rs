use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use thiserror::Error;

use super::backoff::RetryPolicy;
use super::journal::{Journal, JournalError};
use super::path_map::{PathMapError, PathMapper};
use super::remote::{EntryKind, RemoteStore};
use super::report::{DirOutcome, FailureReason, FileOutcome, MirrorReport};
use super::resolver::{Resolution, ResolveError, Resolver};
use super::walk::{Discovery, LocalEntity, WalkError, discover};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("storage service is unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("source path not found: {0:?}")]
    SourceNotFound(PathBuf),
    #[error("discovery failed: {0}")]
    Discovery(WalkError),
    #[error("destination {name:?} cannot be resolved: {reason}")]
    DestinationUnresolvable { name: String, reason: String },
    #[error("{count} remote entries named {name:?} under {}; refusing to guess", .parent.as_deref().unwrap_or("<root>"))]
    AmbiguousRemoteName {
        parent: Option<String>,
        name: String,
        count: usize,
    },
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("path map invariant violated: {0}")]
    PathMap(#[from] PathMapError),
}

impl From<WalkError> for MirrorError {
    fn from(err: WalkError) -> Self {
        match err {
            WalkError::SourceNotFound(path) => MirrorError::SourceNotFound(path),
            other => MirrorError::Discovery(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Upper bound on concurrent file workers.
    pub threads: usize,
    pub journal_path: PathBuf,
    pub journal_batch: usize,
    pub retry: RetryPolicy,
}

/// Drives one mirror run: discovery, destination, directories in order,
/// then files through a bounded pool.
pub struct Orchestrator<S> {
    store: S,
    options: MirrorOptions,
}

impl<S: RemoteStore> Orchestrator<S> {
    pub fn new(store: S, options: MirrorOptions) -> Self {
        Self { store, options }
    }

    #[cfg(test)]
    fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    fn options(&self) -> &MirrorOptions {
        &self.options
    }

    pub async fn run(&self, source: &Path, destination: &str) -> Result<MirrorReport, MirrorError> {
        let health = self
            .store
            .about()
            .await
            .map_err(|err| MirrorError::ServiceUnavailable(err.to_string()))?;
        tracing::debug!(
            total = health.total_space,
            used = health.used_space,
            "storage service reachable"
        );

        let discovery = discover(source)?;
        tracing::info!(
            source = %discovery.root.display(),
            directories = discovery.directories.len(),
            files = discovery.files.len(),
            "source discovered"
        );

        let skip = Journal::load(&self.options.journal_path).await?;
        let journal = Journal::open(
            &self.options.journal_path,
            self.options.journal_batch,
            skip.clone(),
        );
        let resolver = Resolver::new(&self.store, self.options.retry);

        let destination_id = self.resolve_destination(&resolver, destination).await?;
        let mut mapper = PathMapper::new();
        mapper.put(discovery.anchor(), destination_id.clone())?;

        let mut report = MirrorReport {
            destination_id,
            ..MirrorReport::default()
        };
        self.materialize_directories(&resolver, &discovery, &mut mapper, &mut report)
            .await?;
        tracing::debug!(containers = mapper.len(), "directory phase complete");

        // From here on the map is read-only.
        let mapper = mapper;
        let uploaded = self
            .upload_files(&resolver, &discovery, &mapper, &journal, &skip, &mut report)
            .await;
        if let Err(err) = journal.flush().await {
            tracing::warn!(error = %err, "final journal flush failed");
        }
        uploaded?;

        let counts = report.counts();
        tracing::info!(
            created = counts.created,
            uploaded = counts.uploaded,
            already_present = counts.already_present,
            journal_skipped = report.journal_skipped,
            failed = counts.failed,
            "mirror finished"
        );
        Ok(report)
    }

    async fn resolve_destination(
        &self,
        resolver: &Resolver<'_, S>,
        name: &str,
    ) -> Result<String, MirrorError> {
        let name = name.trim();
        let unresolvable = |reason: String| MirrorError::DestinationUnresolvable {
            name: name.to_string(),
            reason,
        };
        if name.is_empty() || name.contains('/') {
            return Err(unresolvable("destination must be a single folder name".into()));
        }

        match resolver.resolve_with_retry(None, name).await {
            Ok(Resolution::Found(entry)) if entry.kind == EntryKind::Directory => {
                tracing::info!(destination = %entry.path, "destination exists");
                Ok(entry.id)
            }
            Ok(Resolution::Found(entry)) => Err(unresolvable(format!(
                "{} is a file, not a folder",
                entry.path
            ))),
            Ok(Resolution::NotFound) => match self.store.mkdir(None, name).await {
                Ok(id) => {
                    tracing::info!(destination = name, "destination created");
                    Ok(id)
                }
                Err(err) => Err(unresolvable(err.to_string())),
            },
            Err(ResolveError::Ambiguous {
                parent,
                name,
                count,
            }) => Err(MirrorError::AmbiguousRemoteName {
                parent,
                name,
                count,
            }),
            Err(err) => Err(unresolvable(err.to_string())),
        }
    }

    async fn materialize_directories(
        &self,
        resolver: &Resolver<'_, S>,
        discovery: &Discovery,
        mapper: &mut PathMapper,
        report: &mut MirrorReport,
    ) -> Result<(), MirrorError> {
        for dir in &discovery.directories {
            let outcome = self.materialize_directory(resolver, dir, mapper).await?;
            match &outcome {
                DirOutcome::Created => {
                    tracing::info!(path = %dir.path.display(), "directory created");
                }
                DirOutcome::AlreadyPresent => {
                    tracing::info!(path = %dir.path.display(), "directory already present");
                }
                DirOutcome::Failed(reason) => {
                    tracing::warn!(path = %dir.path.display(), %reason, "directory failed");
                }
            }
            report.directories.push((dir.path.clone(), outcome));
        }
        Ok(())
    }

    async fn materialize_directory(
        &self,
        resolver: &Resolver<'_, S>,
        dir: &LocalEntity,
        mapper: &mut PathMapper,
    ) -> Result<DirOutcome, MirrorError> {
        let parent_id = match mapper.get(&dir.parent) {
            Ok(id) => id.to_string(),
            Err(PathMapError::ParentNotResolved(_)) => {
                return Ok(DirOutcome::Failed(FailureReason::MissingParent));
            }
            Err(err) => return Err(err.into()),
        };
        let name = entity_name(&dir.path);

        let resolution = match resolver.resolve_with_retry(Some(&parent_id), &name).await {
            Ok(resolution) => resolution,
            Err(err) => return failure_or_fatal(err).map(DirOutcome::Failed),
        };
        match resolution {
            Resolution::Found(entry) if entry.kind == EntryKind::Directory => {
                mapper.put(&dir.path, entry.id)?;
                Ok(DirOutcome::AlreadyPresent)
            }
            Resolution::Found(_) => Ok(DirOutcome::Failed(FailureReason::KindMismatch)),
            Resolution::NotFound => match self.store.mkdir(Some(&parent_id), &name).await {
                Ok(id) => {
                    mapper.put(&dir.path, id)?;
                    Ok(DirOutcome::Created)
                }
                Err(err) => Ok(DirOutcome::Failed(FailureReason::CreationFailed(
                    err.to_string(),
                ))),
            },
        }
    }

    async fn upload_files(
        &self,
        resolver: &Resolver<'_, S>,
        discovery: &Discovery,
        mapper: &PathMapper,
        journal: &Journal,
        skip: &HashSet<PathBuf>,
        report: &mut MirrorReport,
    ) -> Result<(), MirrorError> {
        let mut pending = Vec::new();
        for file in &discovery.files {
            if skip.contains(&file.path) {
                report
                    .files
                    .push((file.path.clone(), FileOutcome::AlreadyPresent));
                report.journal_skipped += 1;
            } else {
                pending.push(file);
            }
        }
        if report.journal_skipped > 0 {
            tracing::info!(
                skipped = report.journal_skipped,
                journal = %journal.path().display(),
                "files already confirmed by journal"
            );
        }

        let mut workers = stream::iter(pending)
            .map(move |file| async move {
                let outcome = self.upload_file(resolver, mapper, journal, file).await;
                (file, outcome)
            })
            .buffer_unordered(self.options.threads.max(1));

        while let Some((file, outcome)) = workers.next().await {
            // A fatal error drops the stream, cancelling in-flight workers.
            let outcome = outcome?;
            match &outcome {
                FileOutcome::Uploaded => {
                    tracing::info!(path = %file.path.display(), "file uploaded");
                }
                FileOutcome::AlreadyPresent => {
                    tracing::info!(path = %file.path.display(), "file already present");
                }
                FileOutcome::Failed(reason) => {
                    tracing::warn!(path = %file.path.display(), %reason, "file failed");
                }
            }
            report.files.push((file.path.clone(), outcome));
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        resolver: &Resolver<'_, S>,
        mapper: &PathMapper,
        journal: &Journal,
        file: &LocalEntity,
    ) -> Result<FileOutcome, MirrorError> {
        let parent_id = match mapper.get(&file.parent) {
            Ok(id) => id,
            Err(PathMapError::ParentNotResolved(_)) => {
                return Ok(FileOutcome::Failed(FailureReason::MissingParent));
            }
            Err(err) => return Err(err.into()),
        };
        let name = entity_name(&file.path);

        let resolution = match resolver.resolve_with_retry(Some(parent_id), &name).await {
            Ok(resolution) => resolution,
            Err(err) => return failure_or_fatal(err).map(FileOutcome::Failed),
        };
        match resolution {
            Resolution::Found(entry) if entry.kind == EntryKind::File => {
                confirm(journal, &file.path).await;
                Ok(FileOutcome::AlreadyPresent)
            }
            Resolution::Found(_) => Ok(FileOutcome::Failed(FailureReason::KindMismatch)),
            Resolution::NotFound => match self.store.upload(&file.path, parent_id).await {
                Ok(()) => {
                    confirm(journal, &file.path).await;
                    Ok(FileOutcome::Uploaded)
                }
                Err(err) => Ok(FileOutcome::Failed(FailureReason::UploadFailed(
                    err.to_string(),
                ))),
            },
        }
    }
}

/// Journal writes are best-effort: a lost entry only costs a remote lookup next run.
async fn confirm(journal: &Journal, path: &Path) {
    if let Err(err) = journal.record(path).await {
        tracing::warn!(path = %path.display(), error = %err, "journal append failed");
    }
}

fn failure_or_fatal(err: ResolveError) -> Result<FailureReason, MirrorError> {
    match err {
        ResolveError::Ambiguous {
            parent,
            name,
            count,
        } => Err(MirrorError::AmbiguousRemoteName {
            parent,
            name,
            count,
        }),
        ResolveError::TransientQuery(msg) => Ok(FailureReason::TransientQuery(msg)),
        ResolveError::Query(msg) => Ok(FailureReason::Query(msg)),
    }
}

fn entity_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
