//! feed-scanner CLI
//!
//! Scans a public channel for pattern matches and records them locally.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use feed_scanner::{
    error::Result,
    models::{Config, MessageId},
    pipeline::{self, ScanOptions},
    services::{PatternMatcher, WebPreviewFeed},
    storage::{CursorState, RecordStore},
};

/// feed-scanner - resumable channel scanner
#[derive(Parser, Debug)]
#[command(
    name = "feed-scanner",
    version,
    about = "Scan a message feed for patterns and coupon links"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "scanner.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    scan: ScanArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Start after this message id, ignoring the stored cursor
    #[arg(long)]
    from_id: Option<MessageId>,

    /// Start from the configured first-run floor (`--from-id` takes priority)
    #[arg(long)]
    reset_state: bool,

    /// Report matches without writing the cursor or records
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate and deduplicate the record store without scanning
    Consolidate,

    /// Validate configuration and compile patterns
    Validate,

    /// Show the cursor and record store summary
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config).with_env_overrides();
    let result = match config.validate() {
        Ok(()) => run(cli, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => code,
        Err(e) if e.is_fatal_config() => {
            log::error!("Invalid configuration: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    match cli.command {
        None => {
            let options = ScanOptions {
                from_id: cli.scan.from_id,
                reset_state: cli.scan.reset_state,
                dry_run: cli.scan.dry_run,
            };
            let feed = WebPreviewFeed::new(&config.feed)?;
            let shutdown = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
                log::info!("Interrupt received, stopping after the current message");
            };

            let report = pipeline::run_scan_until(&config, &feed, &options, shutdown).await?;
            log::info!(
                "Done. Scanned: {}, matched: {}, cursor: {} -> {}",
                report.scanned,
                report.matched,
                report.start_id,
                report.end_cursor
            );

            if report.halted.is_some() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Some(Command::Consolidate) => {
            let records = RecordStore::new(&config.paths.records_file);
            let schema = records.ensure_schema().await?;
            log::info!("Schema: {:?}", schema);

            let summary = records.consolidate().await?;
            log::info!(
                "Consolidated {}: {} -> {} rows ({} merged, {} invalid dropped, {})",
                records.path().display(),
                summary.before,
                summary.after,
                summary.merged,
                summary.dropped_invalid,
                if summary.rewritten { "rewritten" } else { "unchanged" }
            );
        }

        Some(Command::Validate) => {
            let matcher = PatternMatcher::new(&config.patterns)?;
            log::info!("Channel: {}", config.feed.channel);
            log::info!("Feed endpoint: {}", config.feed.base_url);
            log::info!("State file: {}", config.paths.state_file.display());
            log::info!("Records file: {}", config.paths.records_file.display());
            log::info!("✓ {} pattern(s) compiled", matcher.len());
            for rule in &config.patterns {
                log::debug!("  {} => {}", rule.label, rule.regex);
            }
            log::info!("All validations passed!");
        }

        Some(Command::Info) => {
            let summary = pipeline::collect_info(&config).await?;
            match &summary.cursor {
                CursorState::Stored(id) => log::info!("Cursor for {}: {}", summary.channel, id),
                CursorState::Absent => log::info!(
                    "No cursor for {} yet; next scan starts after {}",
                    summary.channel,
                    summary.next_start
                ),
                CursorState::Corrupt { reason } => log::warn!(
                    "Cursor for {} is unusable ({}); next scan starts after {}",
                    summary.channel,
                    reason,
                    summary.next_start
                ),
            }
            log::info!(
                "Records: {} row(s) for {} message(s) in {}",
                summary.rows,
                summary.messages,
                summary.records_file.display()
            );
            for (label, count) in &summary.label_counts {
                log::info!("  {}: {}", label, count);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id_and_reset_accepted_together() {
        let cli = Cli::try_parse_from(["feed-scanner", "--from-id", "5", "--reset-state"]).unwrap();
        assert_eq!(cli.scan.from_id, Some(5));
        assert!(cli.scan.reset_state);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_subcommand_with_global_config() {
        let cli = Cli::try_parse_from(["feed-scanner", "info", "-c", "other.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Info)));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }
}
