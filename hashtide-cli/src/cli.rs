use std::{path::PathBuf, time::Duration};

use hashtide::{
    checkpoint::CheckpointCadence,
    sinks::DEFAULT_MAX_ROWS,
    sources::{SlowBatchPolicy, MAX_INTERVAL},
};

/// Count topic and sentiment labels of a live text feed.
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Hashtide {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Connect to a feed and count until interrupted or the feed closes
    Run(RunArgs),
    /// Print snapshots from an output file
    History(HistoryArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Host serving the newline delimited feed
    #[arg(long, env = "HASHTIDE_HOST", default_value = "localhost")]
    pub host: String,

    /// Port of the feed
    #[arg(short, long, env = "HASHTIDE_PORT", default_value_t = 9009)]
    pub port: u16,

    /// Keyword file. The first line is a header, then whitespace separated keywords.
    #[arg(short, long, env = "HASHTIDE_KEYWORDS")]
    pub keywords: PathBuf,

    /// Sentiment lexicon with one `word score` pair per line. Uses the bundled lexicon if
    /// not given.
    #[arg(long, env = "HASHTIDE_LEXICON")]
    pub lexicon: Option<PathBuf>,

    /// Output file, truncated on start
    #[arg(short, long, env = "HASHTIDE_OUTPUT", default_value = "q2_out.txt")]
    pub output: PathBuf,

    /// Directory for checkpoints. Counts are not persisted if not given.
    #[arg(long, env = "HASHTIDE_CHECKPOINT_DIR")]
    pub checkpoint_dir: Option<PathBuf>,

    /// Checkpoint every n ticks
    #[arg(long, env = "HASHTIDE_CHECKPOINT_EVERY", conflicts_with_all = ["checkpoint_interval_secs", "no_checkpoint"])]
    pub checkpoint_every: Option<u64>,

    /// Checkpoint at most once per interval
    #[arg(long, env = "HASHTIDE_CHECKPOINT_INTERVAL_SECS", conflicts_with = "no_checkpoint")]
    pub checkpoint_interval_secs: Option<u64>,

    /// Only checkpoint on shutdown
    #[arg(long, env = "HASHTIDE_NO_CHECKPOINT")]
    pub no_checkpoint: bool,

    /// Number of committed checkpoints kept on disk
    #[arg(long, env = "HASHTIDE_KEEP_CHECKPOINTS", default_value_t = 3)]
    pub keep_checkpoints: usize,

    /// Tick interval in milliseconds, at most one day
    #[arg(
        long,
        env = "HASHTIDE_BATCH_INTERVAL_MS",
        default_value_t = 2000,
        value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL.as_millis() as u64)
    )]
    pub batch_interval_ms: u64,

    /// What to do with ticks missed while a slow batch was processed
    #[arg(long, env = "HASHTIDE_SLOW_BATCH", value_enum, default_value_t = SlowBatch::Queue)]
    pub slow_batch: SlowBatch,

    /// Classification threads, one per CPU by default
    #[arg(long, env = "HASHTIDE_WORKERS")]
    pub workers: Option<usize>,

    /// Events buffered between the feed and the engine
    #[arg(long, env = "HASHTIDE_FEED_CAPACITY", default_value_t = 100_000)]
    pub feed_capacity: usize,

    /// Upper bound of events per batch
    #[arg(long, env = "HASHTIDE_MAX_BATCH_EVENTS")]
    pub max_batch_events: Option<usize>,

    /// Rows written per snapshot
    #[arg(long, env = "HASHTIDE_MAX_ROWS", default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    /// Order snapshot rows by descending count
    #[arg(long, env = "HASHTIDE_SORT_BY_COUNT")]
    pub sort_by_count: bool,

    /// Do not mirror snapshots to stdout
    #[arg(short, long, env = "HASHTIDE_QUIET")]
    pub quiet: bool,
}

impl RunArgs {
    /// Checkpoint cadence selected by the flags, every tick if none is given
    pub fn cadence(&self) -> CheckpointCadence {
        if self.no_checkpoint {
            CheckpointCadence::Never
        } else if let Some(n) = self.checkpoint_every {
            CheckpointCadence::EveryNTicks(n)
        } else if let Some(secs) = self.checkpoint_interval_secs {
            CheckpointCadence::Interval(Duration::from_secs(secs))
        } else {
            CheckpointCadence::EveryTick
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowBatch {
    /// Run the overdue tick right away
    Queue,
    /// Drop missed ticks
    Skip,
}

impl From<SlowBatch> for SlowBatchPolicy {
    fn from(value: SlowBatch) -> Self {
        match value {
            SlowBatch::Queue => SlowBatchPolicy::Queue,
            SlowBatch::Skip => SlowBatchPolicy::Skip,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    /// Output file written by `run`
    pub file: PathBuf,

    /// Print every snapshot instead of only the last one
    #[arg(short, long)]
    pub all: bool,
}
