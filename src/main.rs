//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest crawl and scrape
//! engine.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_harvest::config::{load_config_with_hash, Config, LoaderKind};
use sumi_harvest::crawler::{Spider, SpiderBuilder};
use sumi_harvest::output::print_statistics;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a declarative crawl and scrape engine
///
/// Sumi-Harvest walks a site from a start URL along the follow steps of a
/// TOML configuration, extracts one record per page according to its field
/// schema, and writes the records to the configured outputs.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A declarative crawl and scrape engine", long_about = None)]
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

    /// Validate config and show the crawl plan without crawling
    #[arg(long)]
    dry_run: bool,

    /// Override the configured worker count
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Override the configured page-visit limit
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(workers) = cli.workers {
        config.crawl.workers = workers;
    }
    if let Some(limit) = cli.limit {
        config.crawl.limit = Some(limit);
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_crawl(&config).await?;
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
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so console records on stdout stay machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the crawl plan
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    // Building runs the same validation a real crawl would
    let spider = SpiderBuilder::from_config(&without_outputs(config)).build()?;
    let built = spider.config();

    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Start URL: {}", built.start_url());
    println!("  Base URL: {}", built.base_url());
    println!("  Workers: {}", built.workers());
    match built.limit() {
        Some(limit) => println!("  Page limit: {}", limit),
        None => println!("  Page limit: none"),
    }
    println!("  Loader: {:?}", config.crawl.loader);

    println!("\nFollow Steps ({}):", built.plan().len());
    for (level, step) in built.plan().iter().enumerate() {
        match &step.pagination_selector {
            Some(pagination) => println!(
                "  {}. {} (next page: {})",
                level + 1,
                step.selector,
                pagination
            ),
            None => println!("  {}. {}", level + 1, step.selector),
        }
    }

    println!("\nFields ({}):", built.schema().len());
    for field in built.schema().fields() {
        println!(
            "  - {} [{}] <- {}",
            field.name(),
            field.kind().as_str(),
            field.selector()
        );
    }

    println!("\nIgnored URLs ({}):", config.crawl.ignore_urls.len());
    for pattern in &config.crawl.ignore_urls {
        println!("  - {}", pattern);
    }

    println!("\nOutput:");
    println!("  Console: {}", config.output.console);
    if let Some(path) = &config.output.json_path {
        println!("  JSON lines: {}", path);
    }
    if let Some(path) = &config.output.database_path {
        println!("  Database: {}", path);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Copy of `config` with every output disabled, so a dry run creates no files
fn without_outputs(config: &Config) -> Config {
    let mut config = config.clone();
    config.output = Default::default();
    config
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config) -> anyhow::Result<()> {
    let builder = SpiderBuilder::from_config(config);
    let builder = match config.crawl.loader {
        LoaderKind::Static => builder,
        LoaderKind::Browser => builder.with_loader(browser_loader(config).await?),
    };
    let spider = builder.build()?;

    if config.output.json_path.is_none()
        && config.output.database_path.is_none()
        && !config.output.console
    {
        tracing::warn!("No output configured; records will be discarded");
    }

    spawn_signal_handler(spider.clone());

    let stats = spider.run(spider.config().workers()).await?;
    tracing::info!("Crawl finished: {:?}", spider.state());

    print_statistics(&stats);
    Ok(())
}

/// First Ctrl-C stops gracefully, the second one aborts in-flight fetches
fn spawn_signal_handler(spider: Spider) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupt received, stopping (press Ctrl-C again to abort)");

        let stopping = spider.clone();
        let stop = tokio::spawn(async move { stopping.stop().await });

        tokio::select! {
            _ = stop => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    spider.abort().await;
                }
            }
        }
    });
}

#[cfg(feature = "browser")]
async fn browser_loader(
    config: &Config,
) -> anyhow::Result<std::sync::Arc<dyn sumi_harvest::crawler::PageLoader>> {
    let loader = sumi_harvest::crawler::BrowserPageLoader::connect(&config.browser)
        .await
        .context("Failed to open browser session")?;
    Ok(std::sync::Arc::new(loader))
}

#[cfg(not(feature = "browser"))]
async fn browser_loader(
    _config: &Config,
) -> anyhow::Result<std::sync::Arc<dyn sumi_harvest::crawler::PageLoader>> {
    anyhow::bail!("loader = \"browser\" requires sumi-harvest built with the `browser` feature")
}
