use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The containing directory never got a remote container.
    MissingParent,
    CreationFailed(String),
    UploadFailed(String),
    /// Lookup kept failing transiently after all retries.
    TransientQuery(String),
    Query(String),
    /// Local and remote disagree on file vs directory for the same name.
    KindMismatch,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingParent => write!(f, "parent directory was not resolved"),
            FailureReason::CreationFailed(msg) => write!(f, "create failed: {msg}"),
            FailureReason::UploadFailed(msg) => write!(f, "upload failed: {msg}"),
            FailureReason::TransientQuery(msg) => write!(f, "lookup kept failing: {msg}"),
            FailureReason::Query(msg) => write!(f, "lookup failed: {msg}"),
            FailureReason::KindMismatch => {
                write!(f, "remote entry of the same name has a different type")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirOutcome {
    Created,
    AlreadyPresent,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded,
    AlreadyPresent,
    Failed(FailureReason),
}

#[derive(Debug, Clone, Default)]
pub struct MirrorReport {
    pub destination_id: String,
    pub directories: Vec<(PathBuf, DirOutcome)>,
    pub files: Vec<(PathBuf, FileOutcome)>,
    /// Files that were never looked up because the journal already had them.
    pub journal_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub created: usize,
    pub uploaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl MirrorReport {
    pub fn has_failures(&self) -> bool {
        self.directories
            .iter()
            .any(|(_, outcome)| matches!(outcome, DirOutcome::Failed(_)))
            || self
                .files
                .iter()
                .any(|(_, outcome)| matches!(outcome, FileOutcome::Failed(_)))
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for (_, outcome) in &self.directories {
            match outcome {
                DirOutcome::Created => counts.created += 1,
                DirOutcome::AlreadyPresent => counts.already_present += 1,
                DirOutcome::Failed(_) => counts.failed += 1,
            }
        }
        for (_, outcome) in &self.files {
            match outcome {
                FileOutcome::Uploaded => counts.uploaded += 1,
                FileOutcome::AlreadyPresent => counts.already_present += 1,
                FileOutcome::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    pub fn file_outcome(&self, path: &std::path::Path) -> Option<&FileOutcome> {
        self.files
            .iter()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, outcome)| outcome)
    }

    pub fn dir_outcome(&self, path: &std::path::Path) -> Option<&DirOutcome> {
        self.directories
            .iter()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, outcome)| outcome)
    }

    /// 0 when every entity reached `Created`, `Uploaded` or `AlreadyPresent`.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() { 1 } else { 0 }
    }
}
