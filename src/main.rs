//! Archive-Harvest main entry point
//!
//! This is the command-line interface for the archive harvester.

use archive_harvest::config::{load_config_with_hash, Config};
use archive_harvest::crawler::{listing_page_urls, Harvester};
use archive_harvest::extract::JournalArticleExtractor;
use archive_harvest::output::{
    print_statistics, write_report, CsvOutputHandler, HarvestStatistics, OutputHandler,
    XlsxOutputHandler,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Archive-Harvest: a polite harvester for paginated document archives
///
/// Archive-Harvest walks an archive's listing pages, containers and leaves
/// with bounded concurrency, extracts one record per article author, and
/// writes records and failure diagnostics as delimiter-separated files and
/// an optional spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "archive-harvest")]
#[command(version)]
#[command(about = "A polite harvester for paginated document archives", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else {
        handle_harvest(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("archive_harvest=info,warn"),
            1 => EnvFilter::new("archive_harvest=debug,info"),
            2 => EnvFilter::new("archive_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Archive-Harvest Dry Run ===\n");

    println!("Archive:");
    println!("  URL: {}", config.archive.url);
    println!("  Listing page template: {}", config.archive.page_url_template);
    if let Some(page_two) = listing_page_urls(&config.archive.url, &config.archive.page_url_template, 2)
        .first()
    {
        println!("  Listing page 2 would be: {}", page_two);
    }

    println!("\nLinks:");
    println!("  Containers: {}", config.links.container_selector);
    println!("  Leaves: {}", config.links.leaf_selector);

    println!("\nPagination:");
    println!("  Summary pattern: {}", config.pagination.summary_pattern);
    println!("  Next-page pattern: {}", config.pagination.next_control_pattern);
    println!(
        "  Fallback page count: {}",
        config.pagination.fallback_page_count
    );
    println!("  Max page count: {}", config.pagination.max_page_count);

    println!("\nNetwork:");
    println!(
        "  Max workers per phase: {}",
        config.network.max_workers_per_phase
    );
    println!("  Request timeout: {}s", config.network.request_timeout_secs);
    println!("  Delay before each request: {}ms", config.network.unit_delay_ms);
    println!("  Max attempts: {}", config.network.max_attempts);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Records: {}", config.output.records_path);
    println!("  Diagnostics: {}", config.output.diagnostics_path);
    if config.output.spreadsheet_path.is_empty() {
        println!("  Spreadsheet: disabled");
    } else {
        println!("  Spreadsheet: {}", config.output.spreadsheet_path);
    }
    println!("  Delimiter: {:?}", config.output.delimiter);

    println!("\n✓ Configuration is valid");
}

/// Runs a harvest, writes its results and prints the summary
async fn handle_harvest(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut outputs: Vec<Box<dyn OutputHandler>> =
        vec![Box::new(CsvOutputHandler::from_config(&config.output)?)];
    if let Some(spreadsheet) = XlsxOutputHandler::from_config(&config.output) {
        outputs.push(Box::new(spreadsheet));
    }

    let cancel = CancellationToken::new();
    let harvester = Harvester::new(
        config,
        Arc::new(JournalArticleExtractor::new()?),
        cancel.clone(),
    )?;

    // Ctrl-C stops scheduling; whatever was collected is still written
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests...");
            interrupt.cancel();
        }
    });

    let report = harvester.run().await;

    for output in &outputs {
        write_report(output.as_ref(), &report)?;
    }
    print_statistics(&HarvestStatistics::from_report(&report));

    Ok(())
}
