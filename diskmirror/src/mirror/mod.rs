pub mod backoff;
pub mod disk_remote;
pub mod journal;
pub mod orchestrator;
pub mod path_map;
pub mod remote;
pub mod report;
pub mod resolver;
pub mod transfer;
pub mod walk;

pub use orchestrator::{MirrorError, Orchestrator};
pub use report::{DirOutcome, FailureReason, FileOutcome, MirrorReport};
