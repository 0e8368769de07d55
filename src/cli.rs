use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dpofinder")]
#[command(about = "Find the privacy / DPO contact channel for a company domain")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/dpofinder.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG with per-page details)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the privacy contact for one domain
    Resolve {
        /// Domain or URL of the company
        domain: String,

        /// Crawl even if a fresh stored record exists
        #[arg(long)]
        force: bool,

        /// Allow a weaker result to replace a verified email
        #[arg(long)]
        allow_downgrade: bool,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve every domain in a CSV or JSON file
    Batch {
        /// Input file (.csv or .json)
        file: PathBuf,

        /// Number of domains resolved in parallel (defaults to config)
        #[arg(short = 'j', long, value_name = "N")]
        parallel_jobs: Option<usize>,

        /// Crawl even if fresh stored records exist
        #[arg(long)]
        force: bool,

        /// Allow weaker results to replace verified emails
        #[arg(long)]
        allow_downgrade: bool,

        /// Directory for batch_summary.json and contacts.csv
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Manage stored contact records
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// List all stored domains
    List,

    /// Show the stored record for a domain
    Show {
        /// Domain to show
        domain: String,
    },

    /// Clear the record for a specific domain or all domains
    Clear {
        /// Domain to clear (omit to use --all)
        domain: Option<String>,

        /// Clear every stored record
        #[arg(long)]
        all: bool,
    },
}
