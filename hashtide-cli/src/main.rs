//! Command line runner for Hashtide
use std::{fs::File, io::BufReader, time::Duration};

use clap::Parser;
use hashtide::{
    checkpoint::{FilesystemBackend, NoPersistence, PersistenceBackend, PersistenceError},
    classify::{Classifier, KeywordError, KeywordTable, LexiconError, LexiconScorer},
    sinks::{
        read_history, render, FileSink, HistoryParseError, RenderOptions, SinkWriteError,
        StdOutSink,
    },
    sources::{connect, SourceError, TickSchedule, TickedSource},
    AggregationEngine, EngineError, ShutdownSignal,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    match main_inner().await {
        Ok(_) => (),
        Err(e) => {
            panic!("{:?}", eyre::Report::new(e))
        }
    }
}

async fn main_inner() -> Result<(), Error> {
    let args = cli::Hashtide::parse();
    debug!("Got the following args: {args:?}");
    match args.command {
        cli::Command::Run(args) => run(args).await,
        cli::Command::History(args) => history(args),
    }
}

async fn run(args: cli::RunArgs) -> Result<(), Error> {
    let keywords = KeywordTable::from_path(&args.keywords)?;
    let scorer = match &args.lexicon {
        Some(path) => LexiconScorer::from_path(path)?,
        None => LexiconScorer::default(),
    };
    let classifier = Classifier::new(keywords, scorer);

    let persistence: Box<dyn PersistenceBackend> = match &args.checkpoint_dir {
        Some(dir) => Box::new(FilesystemBackend::open(dir, args.keep_checkpoints)?),
        None => {
            warn!("No checkpoint directory given, counts will not survive a restart");
            Box::new(NoPersistence)
        }
    };
    let shutdown = ShutdownSignal::new();
    let mut engine = AggregationEngine::builder()
        .classifier(classifier)
        .persistence(persistence)
        .cadence(args.cadence())
        .shutdown(shutdown.clone())
        .maybe_workers(args.workers)
        .build()?;

    let options = RenderOptions {
        sort_by_count: args.sort_by_count,
        max_rows: args.max_rows,
    };
    let stdout = (!args.quiet).then(|| StdOutSink::new(options));
    let mut sink = (FileSink::create(&args.output, options)?, stdout);

    let events = connect(&args.host, args.port, args.feed_capacity).await?;
    let schedule = TickSchedule::new(
        Duration::from_millis(args.batch_interval_ms),
        args.slow_batch.into(),
    );
    let mut source = TickedSource::new(events, schedule);
    if let Some(max) = args.max_batch_events {
        source = source.with_max_batch_events(max);
    }

    let mut engine_task =
        tokio::task::spawn_blocking(move || engine.run(&mut source, &mut sink));
    let result = tokio::select! {
        res = &mut engine_task => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping after the current batch");
            shutdown.trigger();
            engine_task.await
        }
    };
    let summary = result.map_err(Error::Join)??;
    info!(
        "Counted {} of {} events in {} ticks, last checkpoint {:?}",
        summary.matched, summary.events, summary.ticks, summary.final_checkpoint
    );
    Ok(())
}

fn history(args: cli::HistoryArgs) -> Result<(), Error> {
    let file = File::open(&args.file)?;
    let records = read_history(BufReader::new(file))?;
    println!("{} snapshots in {}", records.len(), args.file.display());
    let shown = if args.all {
        records.as_slice()
    } else {
        records.last().map(std::slice::from_ref).unwrap_or_default()
    };
    let options = RenderOptions {
        sort_by_count: false,
        max_rows: usize::MAX,
    };
    for record in shown {
        print!("{}", render(record.timestamp, &record.counts, &options));
    }
    Ok(())
}

#[derive(Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid keyword configuration")]
    Keywords(#[from] KeywordError),
    #[error("Invalid sentiment lexicon")]
    Lexicon(#[from] LexiconError),
    #[error("Cannot open checkpoint directory")]
    Persistence(#[from] PersistenceError),
    #[error("Cannot create output file")]
    Output(#[from] SinkWriteError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Cannot parse history")]
    History(#[from] HistoryParseError),
    #[error("Engine thread failed: {0}")]
    Join(tokio::task::JoinError),
}
