// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands share most of their flags:
// - dir:  search a directory tree for a keyword
// - site: crawl a website and search every page for a keyword
//
// The shared flags live in ScanArgs and are pulled into both subcommands
// with #[command(flatten)].
// =============================================================================

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "scan-guardian",
    version,
    about = "Search directory trees and websites for a keyword, with bounded concurrency",
    long_about = "scan-guardian walks a directory tree or crawls a website, reading every file or page \
                  at most once (even when links or symlinks form cycles) and reporting the ones that \
                  contain a keyword. Unreadable nodes are reported as warnings."
)]
pub struct Cli {
    /// Print debug logs to stderr (overrides SCAN_GUARDIAN_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a directory tree
    ///
    /// Example: scan-guardian dir ./src --keyword TODO
    Dir {
        /// Directory (or single file) to start from
        root: String,

        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Crawl a website and search its pages
    ///
    /// Example: scan-guardian site https://example.com --keyword pricing --max-depth 3
    Site {
        /// Website URL to start crawling from
        website_url: String,

        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum crawl depth (1 = just the starting page)
        #[arg(long, default_value_t = 2)]
        max_depth: usize,

        /// Pause after every page fetch, in milliseconds
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },
}

/// Flags shared by every subcommand
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Text to look for
    #[arg(long, short)]
    pub keyword: String,

    /// Maximum number of files/pages processed at the same time
    #[arg(long, short, default_value_t = scan_guardian::config::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Match the keyword case-insensitively
    #[arg(long, short = 'i')]
    pub ignore_case: bool,

    /// Abort on the first access or transport failure instead of warning
    #[arg(long)]
    pub fail_fast: bool,

    /// Give up on a single file/page after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,
}
