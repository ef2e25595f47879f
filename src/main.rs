// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing) on stderr
// 3. Build the provider for the subcommand (directory tree or website)
// 4. Run the traversal and print hits + warnings
// 5. Exit with proper code (0 = hits found, 1 = no hits, 2 = error)
//
// The scanning machinery itself lives in the library (src/lib.rs); this file
// only turns flags into configuration and results into terminal output.
// =============================================================================

mod cli; // src/cli.rs - command-line parsing

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ScanArgs};
use scan_guardian::config::{CrawlConfig, ScanConfig};
use scan_guardian::error::TraversalError;
use scan_guardian::provider::{FsProvider, Provider, WebProvider};
use scan_guardian::traverse::{ContainsKeyword, Event, EventKind, RenderedReport, Traversal};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // If an unexpected error occurred, print it and exit with code 2
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so that --json output on stdout stays machine readable
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("scan_guardian=debug")
    } else {
        EnvFilter::try_from_env("SCAN_GUARDIAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Dir { root, scan } => handle_dir_scan(&root, &scan).await,
        Commands::Site {
            website_url,
            scan,
            max_depth,
            delay_ms,
        } => handle_site_scan(&website_url, &scan, max_depth, delay_ms).await,
    }
}

// Handles the 'dir' subcommand
async fn handle_dir_scan(root: &str, scan: &ScanArgs) -> Result<i32> {
    if !scan.json {
        println!("🔍 Searching {} for \"{}\"", root, scan.keyword);
    }

    let config = scan_config(scan);
    config.validate()?;

    let (provider, root_node) = FsProvider::open(root)
        .await
        .with_context(|| format!("cannot open {}", root))?;

    let traversal = Traversal::new(provider, keyword(scan)?, config);
    run_traversal(traversal, root_node, scan.json).await
}

// Handles the 'site' subcommand
async fn handle_site_scan(
    website_url: &str,
    scan: &ScanArgs,
    max_depth: usize,
    delay_ms: u64,
) -> Result<i32> {
    if !scan.json {
        println!("🔍 Crawling {} for \"{}\"", website_url, scan.keyword);
        println!("📊 Max crawl depth: {}", max_depth);
    }

    let config = scan_config(scan);
    config.validate()?;

    let mut crawl = CrawlConfig::default()
        .with_max_depth(max_depth)
        .with_polite_delay(Duration::from_millis(delay_ms));
    if let Some(timeout) = config.task_timeout {
        crawl = crawl.with_request_timeout(timeout);
    }

    let provider = WebProvider::new(website_url, crawl)?;
    let root_node = provider.root();

    let traversal = Traversal::new(provider, keyword(scan)?, config);
    run_traversal(traversal, root_node, scan.json).await
}

fn scan_config(scan: &ScanArgs) -> ScanConfig {
    ScanConfig::new(scan.concurrency)
        .with_fail_fast(scan.fail_fast)
        .with_task_timeout(scan.timeout_secs.map(Duration::from_secs))
}

fn keyword(scan: &ScanArgs) -> Result<ContainsKeyword> {
    Ok(ContainsKeyword::new(scan.keyword.clone())?.ignore_case(scan.ignore_case))
}

// Wires progress output and Ctrl-C into the traversal, runs it, prints results
async fn run_traversal<P: Provider>(
    traversal: Traversal<P>,
    root: P::Node,
    json: bool,
) -> Result<i32> {
    // Ctrl-C stops the scan at the next I/O boundary instead of killing it mid-write
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let traversal = traversal
        .with_cancellation(cancel)
        .on(EventKind::Error, |event| {
            if let Event::Error { node, kind, message } = event {
                eprintln!("⚠️  Warning: {} ({}): {}", node, kind, message);
            }
        });

    let traversal = if json {
        traversal
    } else {
        traversal.on(EventKind::Found, |event| {
            if let Event::Found { node } = event {
                println!("   ✅ {}", node);
            }
        })
    };

    match traversal.run(root).await {
        Ok(report) => {
            let rendered = report.render();
            print_results(&rendered, json)?;

            if rendered.hits.is_empty() {
                Ok(1) // Exit code 1 = nothing matched
            } else {
                Ok(0) // Exit code 0 = at least one hit
            }
        }
        Err(e) => {
            report_fatal(&e);
            Ok(2)
        }
    }
}

fn report_fatal(error: &TraversalError) {
    match error {
        TraversalError::Cancelled => eprintln!("🛑 Scan interrupted"),
        other => eprintln!("❌ Scan aborted: {}", other),
    }
}

// Prints the results either as a table or JSON
fn print_results(report: &RenderedReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_table(report);
    }
    Ok(())
}

// Prints results as a human-readable table in the terminal
fn print_table(report: &RenderedReport) {
    println!();
    println!("MATCH");
    println!("{}", "=".repeat(80));
    for hit in &report.hits {
        println!("{:<80}", truncate(hit, 77));
    }

    if !report.errors.is_empty() {
        println!();
        println!("{:<60} {:<20} {:<30}", "SKIPPED", "REASON", "MESSAGE");
        println!("{}", "=".repeat(110));
        for error in &report.errors {
            println!(
                "{:<60} {:<20} {:<30}",
                truncate(&error.node, 57),
                error.kind.to_string(),
                error.message
            );
        }
    }

    println!();
    println!("📊 Summary:");
    println!("   ✅ Matches: {}", report.hits.len());
    println!("   ⚠️  Skipped: {}", report.errors.len());
    println!("   📋 Visited: {}", report.visited);
    println!(
        "   ⏱️  {} ms, {} task(s), peak concurrency {}",
        report.stats.elapsed.as_millis(),
        report.stats.tasks,
        report.stats.peak_concurrency
    );
}

// Truncate long paths/URLs for display
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
