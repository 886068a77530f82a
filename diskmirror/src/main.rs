use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use diskmirror::config::MirrorConfig;
use diskmirror::mirror::Orchestrator;
use diskmirror::mirror::disk_remote::DiskRemote;
use diskmirror_core::DiskClient;
use tracing_subscriber::EnvFilter;

/// Mirror a local file or directory into a folder at the root of Yandex Disk.
#[derive(Debug, Parser)]
#[command(name = "mirror", version)]
struct Cli {
    /// Local file or directory to mirror.
    #[arg(long)]
    src: PathBuf,
    /// Name of the top-level remote folder to mirror into.
    #[arg(long)]
    dest: String,
    /// Concurrent upload workers.
    #[arg(long)]
    threads: Option<usize>,
    /// Resume journal location.
    #[arg(long)]
    journal: Option<PathBuf>,
    /// Confirmations buffered before a journal flush.
    #[arg(long)]
    journal_batch: Option<usize>,
    #[arg(long, env = "YADISK_TOKEN", hide_env_values = true)]
    token: String,
    #[arg(long, env = "YADISK_API_URL")]
    api_url: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut MirrorConfig) {
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(journal) = &self.journal {
            config.journal_path = Some(journal.clone());
        }
        if let Some(batch) = self.journal_batch {
            config.journal_batch = batch;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = MirrorConfig::from_env()?;
    cli.apply(&mut config);

    let client = match &cli.api_url {
        Some(url) => DiskClient::with_base_url(url, cli.token.clone()),
        None => DiskClient::new(cli.token.clone()),
    }
    .context("failed to build Yandex Disk client")?;

    let options = config.mirror_options(&cli.src, &cli.dest);
    tracing::debug!(
        threads = options.threads,
        journal = %options.journal_path.display(),
        "starting mirror"
    );
    let orchestrator = Orchestrator::new(DiskRemote::new(client), options);
    let report = orchestrator
        .run(&cli.src, &cli.dest)
        .await
        .with_context(|| format!("mirror of {} aborted", cli.src.display()))?;
    Ok(report.exit_code())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            1
        }
    };
    std::process::exit(code);
}
