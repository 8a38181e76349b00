use clap::{Args, Parser, Subcommand};
use page_duper_core::config::{ClusterMode, ConcurrencyMode};

#[derive(Debug, Parser)]
#[command(name = "page-duper")]
#[command(about = "Find near-duplicate pages across a tree of PDFs", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags that take precedence over `PageDuper.toml` and `PAGE_DUPER_*` values.
#[derive(Debug, Args)]
pub struct Overrides {
    /// Directory searched recursively for PDFs
    #[arg(long, global = true)]
    pub input: Option<String>,
    /// Directory that receives cluster or OCR output
    #[arg(long, global = true)]
    pub output: Option<String>,
    /// SQLite database file
    #[arg(long, global = true)]
    pub db: Option<String>,
    /// Minimum similarity score (0-100) for pages to cluster
    #[arg(long, global = true)]
    pub threshold: Option<u32>,
    /// Worker count
    #[arg(long, global = true)]
    pub jobs: Option<usize>,
    /// Hashing concurrency: sequential or parallel
    #[arg(long, global = true)]
    pub mode: Option<ConcurrencyMode>,
    /// Clustering: transitive or first-match
    #[arg(long, global = true)]
    pub cluster_mode: Option<ClusterMode>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash every page, cluster similar pages and write one PDF per cluster
    Process,
    /// Hash every page into the database without clustering
    Hash,
    /// Cluster and export the pages already in the database
    Cluster,
    /// OCR every PDF, tracking per-document status across runs
    Ocr {
        /// Try documents that reached the retry limit again
        #[arg(long)]
        retry_failed: bool,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
