use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "codebatch",
    about = "Reproducible, queryable code-analysis batches",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root; defaults to $CODEBATCH_STORE.
    #[arg(long, global = true, env = "CODEBATCH_STORE")]
    pub store: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a store root
    Init(InitArgs),
    /// Build an immutable snapshot of a directory
    Snapshot(SnapshotArgs),
    /// Materialize a batch for a snapshot and pipeline
    BatchInit(BatchInitArgs),
    /// Execute a single shard
    RunShard(RunShardArgs),
    /// Drive all shards of a batch to completion
    Run(RunArgs),
    /// Continue a batch, skipping completed shards
    Resume(RunArgs),
    /// Reset a failed shard back to pending
    ResetShard(RunShardArgs),
    /// Build or refresh the LMDB acceleration cache
    IndexBuild(IndexBuildArgs),
    /// Query batch outputs
    #[command(subcommand)]
    Query(QueryCommand),
    /// Compare the outputs of two batches
    Diff(DiffArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Directory to initialize as a store
    pub path: PathBuf,
}

#[derive(Args)]
pub struct SnapshotArgs {
    /// Directory to snapshot
    pub dir: PathBuf,
    /// Include globs over canonical paths (default: everything)
    #[arg(long)]
    pub include: Vec<String>,
    /// Exclude globs over canonical paths
    #[arg(long)]
    pub exclude: Vec<String>,
    /// Include dot-files and dot-directories
    #[arg(long)]
    pub include_hidden: bool,
    /// Follow symlinks (walk loops are rejected)
    #[arg(long)]
    pub follow_symlinks: bool,
}

#[derive(Args)]
pub struct BatchInitArgs {
    #[arg(long)]
    pub snapshot: String,
    #[arg(long)]
    pub pipeline: String,
}

#[derive(Args)]
pub struct RunShardArgs {
    #[arg(long)]
    pub batch: String,
    #[arg(long)]
    pub task: String,
    /// Shard id, two hex chars (00-ff)
    #[arg(long)]
    pub shard: String,
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(long)]
    pub batch: String,
    /// Worker count (default: available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args)]
pub struct IndexBuildArgs {
    #[arg(long)]
    pub batch: String,
    /// Wipe the existing environment before building
    #[arg(long)]
    pub rebuild: bool,
}

#[derive(Subcommand)]
pub enum QueryCommand {
    /// All output records
    Outputs(QueryArgs),
    /// Diagnostic records only
    Diagnostics(QueryArgs),
    /// Counts grouped by kind, severity, code, or lang
    Stats(StatsArgs),
    /// Paths that produced error diagnostics
    FailedFiles(QueryArgs),
}

#[derive(Args)]
pub struct QueryArgs {
    #[arg(long)]
    pub batch: String,
    #[arg(long)]
    pub task: Option<String>,
    #[arg(long)]
    pub kind: Option<String>,
    /// Case-insensitive substring match on record paths
    #[arg(long)]
    pub path: Option<String>,
    #[arg(long)]
    pub severity: Option<String>,
    #[arg(long)]
    pub code: Option<String>,
    /// Skip the cache and read the authoritative JSONL directly
    #[arg(long)]
    pub no_cache: bool,
    /// Exit 1 if the query returns nothing
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub query: QueryArgs,
    #[arg(long, default_value = "kind")]
    pub group_by: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub batch_a: String,
    pub batch_b: String,
    /// Restrict to one output kind
    #[arg(long)]
    pub kind: Option<String>,
    /// Report diagnostic regressions and improvements instead of raw sets
    #[arg(long)]
    pub regressions: bool,
}
