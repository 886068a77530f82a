use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};

use crate::mirror::backoff::{Backoff, RetryPolicy};
use crate::mirror::journal::DEFAULT_BATCH_SIZE;
use crate::mirror::orchestrator::MirrorOptions;

const DEFAULT_THREADS: u64 = 8;
const DEFAULT_QUERY_RETRIES: u64 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 250;
const DEFAULT_RETRY_MAX_MS: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub threads: usize,
    pub journal_batch: usize,
    /// Explicit journal location; derived from source and destination when unset.
    pub journal_path: Option<PathBuf>,
    pub query_retries: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    pub state_dir: PathBuf,
}

impl MirrorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let threads = read_u64_env("DISKMIRROR_THREADS", DEFAULT_THREADS) as usize;
        let journal_batch =
            read_u64_env("DISKMIRROR_JOURNAL_BATCH", DEFAULT_BATCH_SIZE as u64) as usize;
        let journal_path = std::env::var("DISKMIRROR_JOURNAL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| expand_path(&value))
            .transpose()?;
        let query_retries =
            read_u64_env("DISKMIRROR_QUERY_RETRIES", DEFAULT_QUERY_RETRIES).min(16) as u32;
        let retry_base = Duration::from_millis(read_u64_env(
            "DISKMIRROR_RETRY_BASE_MS",
            DEFAULT_RETRY_BASE_MS,
        ));
        let retry_max = Duration::from_millis(read_u64_env(
            "DISKMIRROR_RETRY_MAX_MS",
            DEFAULT_RETRY_MAX_MS,
        ));
        let state_dir = std::env::var("DISKMIRROR_STATE_DIR")
            .ok()
            .map(|value| expand_path(&value))
            .transpose()?
            .unwrap_or_else(default_state_dir);

        Ok(Self {
            threads,
            journal_batch,
            journal_path,
            query_retries,
            retry_base,
            retry_max,
            state_dir,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.query_retries,
            Backoff::new(self.retry_base, self.retry_max, true),
        )
    }

    pub fn journal_path_for(&self, source: &Path, destination: &str) -> PathBuf {
        self.journal_path
            .clone()
            .unwrap_or_else(|| default_journal_path(&self.state_dir, source, destination))
    }

    pub fn mirror_options(&self, source: &Path, destination: &str) -> MirrorOptions {
        MirrorOptions {
            threads: self.threads.max(1),
            journal_path: self.journal_path_for(source, destination),
            journal_batch: self.journal_batch.max(1),
            retry: self.retry_policy(),
        }
    }
}

/// One journal per (source, destination) pair so skip sets never leak between mirrors.
/// Different spellings of the same source share a journal.
pub fn default_journal_path(state_dir: &Path, source: &Path, destination: &str) -> PathBuf {
    let source = normalize_source(source);
    let mut hasher = Sha256::new();
    hasher.update(source.as_os_str().as_encoded_bytes());
    hasher.update([0u8]);
    hasher.update(destination.trim().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    state_dir.join(format!("journal-{}.log", &digest[..16]))
}

/// Canonical form when the source exists, otherwise the path with `.`
/// segments and trailing separators dropped.
fn normalize_source(source: &Path) -> PathBuf {
    std::fs::canonicalize(source).unwrap_or_else(|_| source.components().collect())
}

fn expand_path(value: &str) -> anyhow::Result<PathBuf> {
    if value == "~" || value.starts_with("~/") {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        return Ok(expand_with_home(value, &home));
    }
    Ok(PathBuf::from(value))
}

fn default_state_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("diskmirror")
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MirrorConfig {
        MirrorConfig {
            threads: 0,
            journal_batch: 0,
            journal_path: None,
            query_retries: 2,
            retry_base: Duration::from_millis(10),
            retry_max: Duration::from_millis(100),
            state_dir: PathBuf::from("/state"),
        }
    }

    #[test]
    fn expands_tilde_to_home() {
        let home = PathBuf::from("/tmp/home-user");
        assert_eq!(
            expand_with_home("~/mirror.log", &home),
            PathBuf::from("/tmp/home-user/mirror.log")
        );
        assert_eq!(expand_with_home("/abs", &home), PathBuf::from("/abs"));
    }

    #[test]
    fn reads_numbers_from_env_or_default() {
        assert_eq!(read_u64_env("NO_SUCH_ENV_FOR_DISKMIRROR_TEST", 42), 42);
    }

    #[test]
    fn journal_path_depends_on_source_and_destination() {
        let state = Path::new("/state");
        let a = default_journal_path(state, Path::new("/home/u/proj"), "Archive");
        let b = default_journal_path(state, Path::new("/home/u/proj"), "Backups");
        let again = default_journal_path(state, Path::new("/home/u/proj"), " Archive ");
        assert_ne!(a, b);
        assert_eq!(a, again);
        assert!(a.starts_with(state));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("journal-") && name.ends_with(".log"));
        assert_eq!(name.len(), "journal-".len() + 16 + ".log".len());
    }

    #[test]
    fn source_spellings_share_a_journal() {
        let state = Path::new("/state");
        let plain = default_journal_path(state, Path::new("/home/u/proj"), "Archive");
        let slash = default_journal_path(state, Path::new("/home/u/proj/"), "Archive");
        let dotted = default_journal_path(state, Path::new("/home/u/./proj"), "Archive");
        assert_eq!(plain, slash);
        assert_eq!(plain, dotted);

        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("proj");
        std::fs::create_dir(&proj).unwrap();
        let direct = default_journal_path(state, &proj, "Archive");
        let roundabout = default_journal_path(state, &proj.join("../proj/"), "Archive");
        assert_eq!(direct, roundabout);
    }

    #[test]
    fn paths_without_tilde_need_no_home() {
        assert_eq!(
            expand_path("/var/lib/mirror.log").unwrap(),
            PathBuf::from("/var/lib/mirror.log")
        );
        assert_eq!(expand_path("rel/j.log").unwrap(), PathBuf::from("rel/j.log"));
    }

    #[test]
    fn explicit_journal_path_wins() {
        let mut config = config();
        config.journal_path = Some(PathBuf::from("/tmp/custom.log"));
        assert_eq!(
            config.journal_path_for(Path::new("/src"), "Archive"),
            PathBuf::from("/tmp/custom.log")
        );
    }

    #[test]
    fn mirror_options_clamp_zero_knobs() {
        let options = config().mirror_options(Path::new("/src"), "Archive");
        assert_eq!(options.threads, 1);
        assert_eq!(options.journal_batch, 1);
        assert!(options.retry.allows_retry(1));
        assert!(!options.retry.allows_retry(2));
    }
}
