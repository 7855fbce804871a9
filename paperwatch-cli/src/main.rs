//! paperwatch CLI: one daily digest run per invocation.
//!
//! Loads layered configuration, runs the fetch-classify-download
//! pipeline, and prints a human-readable summary. Diagnostics go to
//! stderr via `tracing`; the summary goes to stdout.

use clap::Parser;
use paperwatch_core::{RunSummary, load_config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// paperwatch: daily arXiv CS digest by organization
#[derive(Parser, Debug)]
#[command(name = "paperwatch", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report intended downloads without network or filesystem writes
    #[arg(long)]
    dry_run: bool,

    /// Output root directory (overrides configuration)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Print the run summary as JSON instead of the human layout
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let mut config = load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    if cli.dry_run {
        config.download.dry_run = true;
    }
    if let Some(out_dir) = cli.out_dir {
        config.download.out_dir = out_dir;
    }

    if config.organizations.is_empty() {
        tracing::warn!(
            "no organizations configured; add [organizations.<name>] tables to the config file"
        );
    }

    let summary = paperwatch_core::run(&config).await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, config.download.dry_run);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!(
        "Window (UTC): {}  ->  {}",
        summary.window.start_utc, summary.window.end_utc
    );
    println!(
        "Scanned {} entries, {} in window",
        summary.scanned, summary.baseline_matches
    );
    println!(
        "Output root: {}{}",
        summary.root_dir.display(),
        if dry_run { "  (dry-run)" } else { "" }
    );

    if summary.organizations.is_empty() {
        println!("No matching papers in the window (baseline and targeted search).");
        return;
    }

    for report in &summary.organizations {
        println!(
            "  [{}] {} matched, {} downloaded -> {}",
            report.organization,
            report.matched,
            report.downloaded.len(),
            report.dir.display()
        );
    }
    println!("Total: {} file(s)", summary.total_downloaded());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::parse_from([
            "paperwatch",
            "--dry-run",
            "--out-dir",
            "/tmp/papers",
            "-vv",
        ]);
        assert!(cli.dry_run);
        assert_eq!(cli.out_dir.as_deref(), Some(std::path::Path::new("/tmp/papers")));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        assert!(!cli.json);
    }
}
