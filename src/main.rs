mod cli;

use vidrelay::auth::{AuthorizedUserProvider, CredentialProvider, StaticTokenProvider};
use vidrelay::checkpoint::{format_checkpoint, parse_checkpoint, CheckpointStore, FileCheckpointStore};
use vidrelay::config::{self, Config};
use vidrelay::fetch::YtDlpFetcher;
use vidrelay::ledger::RetryLedger;
use vidrelay::orchestrator::{Orchestrator, RunReport, RunSettings};
use vidrelay::transform::{FfmpegTransformer, TransformSpec};
use vidrelay::youtube::YouTubeClient;
use vidrelay_common::ItemState;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use cli::{CheckpointAction, Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidrelay=trace,vidrelay_av=trace,vidrelay_common=debug".to_string()
        } else {
            "vidrelay=debug,vidrelay_av=debug,vidrelay_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Run { dry_run } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_pipeline(cli.config.as_deref(), dry_run))
        }
        Commands::Checkpoint { action } => checkpoint_command(cli.config.as_deref(), action),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vidrelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Resolved external tool paths.
struct Tools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    ytdlp: PathBuf,
}

impl Tools {
    /// Resolve every tool, failing on the first missing one.
    fn resolve(config: &Config) -> Result<Self> {
        let tools = &config.tools;
        let resolve = |name: &str, configured: Option<&Path>| {
            vidrelay_av::get_tool_path(name, configured)
                .with_context(|| format!("{} is required; install it or set its path under [tools]", name))
        };

        Ok(Self {
            ffmpeg: resolve("ffmpeg", tools.ffmpeg_path.as_deref())?,
            ffprobe: resolve("ffprobe", tools.ffprobe_path.as_deref())?,
            ytdlp: resolve("yt-dlp", tools.ytdlp_path.as_deref())?,
        })
    }

    /// Names or configured paths, unchecked.
    fn unchecked(config: &Config) -> Self {
        let tools = &config.tools;
        let pick = |configured: &Option<PathBuf>, name: &str| {
            configured.clone().unwrap_or_else(|| PathBuf::from(name))
        };

        Self {
            ffmpeg: pick(&tools.ffmpeg_path, "ffmpeg"),
            ffprobe: pick(&tools.ffprobe_path, "ffprobe"),
            ytdlp: pick(&tools.ytdlp_path, "yt-dlp"),
        }
    }
}

const MAX_LOOKBACK_HOURS: u64 = 24 * 365 * 100;

fn checkpoint_store(config: &Config) -> FileCheckpointStore {
    // Capped so an absurd lookback cannot overflow chrono's range.
    let hours = config.pipeline.lookback_hours.min(MAX_LOOKBACK_HOURS) as i64;
    FileCheckpointStore::new(&config.paths.checkpoint_file, chrono::Duration::hours(hours))
}

fn build_orchestrator(config: &Config, tools: Tools) -> Orchestrator {
    let http = reqwest::Client::new();
    let credentials: Arc<dyn CredentialProvider> = match &config.auth.access_token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => Arc::new(AuthorizedUserProvider::new(&config.auth.credentials_file, http)),
    };

    let youtube = Arc::new(YouTubeClient::new(
        &config.youtube,
        credentials,
        config.pipeline.max_pages,
    ));

    let fetcher = Arc::new(YtDlpFetcher::new(
        tools.ytdlp,
        &config.paths.download_dir,
        &config.youtube.watch_url_template,
    ));

    let transformer = Arc::new(FfmpegTransformer::new(
        TransformSpec::from_config(config),
        tools.ffmpeg,
        tools.ffprobe,
        &config.paths.download_dir,
        config.paths.cache_dir(),
    ));

    let orchestrator = Orchestrator::new(
        youtube.clone(),
        fetcher,
        transformer,
        youtube,
        Arc::new(checkpoint_store(config)),
        RunSettings::from_config(config),
    );

    if config.pipeline.retry_failed {
        let ledger = RetryLedger::load(&config.paths.ledger_file, config.pipeline.max_attempts);
        tracing::info!(
            "Retry ledger {:?} holds {} video(s)",
            ledger.path(),
            ledger.len()
        );
        orchestrator.with_ledger(ledger)
    } else {
        orchestrator
    }
}

async fn run_pipeline(config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    config::validate_for_run(&config)?;

    if dry_run {
        let orchestrator = build_orchestrator(&config, Tools::unchecked(&config));
        let plan = orchestrator.plan().await?;

        println!("Checkpoint: {}", format_checkpoint(plan.since));
        println!("Candidates: {}", plan.candidates.len());
        for record in &plan.candidates {
            println!(
                "  {} {} {}",
                format_checkpoint(record.published_at),
                record.id,
                record.title
            );
        }
        if plan.deferred > 0 {
            println!("Deferred to a later run: {}", plan.deferred);
        }
        println!("\n[DRY RUN] Nothing downloaded or published; checkpoint unchanged");
        return Ok(());
    }

    let tools = Tools::resolve(&config)?;
    tracing::debug!(
        "Using ffmpeg {:?}, ffprobe {:?}, yt-dlp {:?}",
        tools.ffmpeg,
        tools.ffprobe,
        tools.ytdlp
    );

    let orchestrator = build_orchestrator(&config, tools);
    let report = orchestrator.run_at(Utc::now()).await?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run {}", report.run_id);
    for outcome in &report.outcomes {
        match &outcome.state {
            ItemState::Published { remote_id } => {
                println!("✓ {} {:?} -> {}", outcome.record.id, outcome.record.title, remote_id)
            }
            state => println!("✗ {} {:?}: {}", outcome.record.id, outcome.record.title, state),
        }
    }
    if report.deferred > 0 {
        println!("{} video(s) deferred to the next run", report.deferred);
    }
    println!(
        "\n{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );
    println!(
        "Checkpoint: {} -> {}",
        format_checkpoint(report.previous_checkpoint),
        format_checkpoint(report.checkpoint)
    );
}

fn checkpoint_command(config_path: Option<&Path>, action: CheckpointAction) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = checkpoint_store(&config);

    match action {
        CheckpointAction::Show => match store.stored() {
            Some(at) => println!("{}", format_checkpoint(at)),
            None => println!(
                "No checkpoint stored at {:?}; next run starts from {}",
                store.path(),
                format_checkpoint(store.read_at(Utc::now()))
            ),
        },
        CheckpointAction::Set { at } => {
            let at = parse_checkpoint(&at)
                .with_context(|| format!("Invalid RFC 3339 timestamp: {:?}", at))?;
            store.write(at)?;
            println!("Checkpoint set to {}", format_checkpoint(at));
        }
        CheckpointAction::Reset => {
            store
                .reset()
                .with_context(|| format!("Failed to remove {:?}", store.path()))?;
            println!("Checkpoint reset");
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let configured = Tools::unchecked(&config);
    let tools = [
        vidrelay_av::tools::check_program("ffmpeg", &configured.ffmpeg, "-version"),
        vidrelay_av::tools::check_program("ffprobe", &configured.ffprobe, "-version"),
        vidrelay_av::tools::check_program("yt-dlp", &configured.ytdlp, "--version"),
    ];
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if !all_ok {
        anyhow::bail!("Some required tools are missing");
    }
    println!("All required tools are available!");

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => println!("Validating config: {:?}", p),
        None => println!("No config file specified, searching default locations"),
    }

    let config = config::load_config_or_default(path)?;
    println!("✓ Configuration is valid");
    if config.channel_id.is_empty() {
        println!("  Channel: (not set)");
    } else {
        println!("  Channel: {}", config.channel_id);
    }
    println!("  Download dir: {:?}", config.paths.download_dir);
    println!("  Checkpoint: {:?}", config.paths.checkpoint_file);
    println!(
        "  Overlay: {:?} at {}px, {}",
        config.transform.overlay_path, config.transform.overlay_height, config.transform.corner
    );
    println!("  Closing segment: {:?}", config.transform.closing_segment_path);
    println!("  Visibility: {}", config.publish.visibility);
    println!(
        "  Batch: up to {} video(s), concurrency {}",
        config.pipeline.max_videos, config.pipeline.concurrency
    );
    println!("  Retry failed: {}", config.pipeline.retry_failed);

    Ok(())
}
