use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "epi",
    version,
    about = "PPE inspection compliance: latest status per technician and item"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Report(ReportArgs),
    ExportPending(ExportPendingArgs),
    CacheStatus(CacheStatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = ".cache/epi")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub policy_path: Option<PathBuf>,

    /// Defaults to EPI_REFERENCE_DATE, then today's local date.
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,

    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    #[arg(long)]
    pub manager: Option<String>,

    #[arg(long)]
    pub coordinator: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// manager, coordinator, or the name of any other source column.
    #[arg(long = "group-by")]
    pub group_by: Vec<String>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportPendingArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CacheStatusArgs {
    #[arg(long, default_value = ".cache/epi")]
    pub cache_root: PathBuf,
}
