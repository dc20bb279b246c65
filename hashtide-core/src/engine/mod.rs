//! The aggregation engine drives ticks: classify a batch, count it, publish a snapshot and
//! checkpoint when the trigger fires.
use bon::bon;
use indexmap::IndexMap;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, debug_span, info, warn};

use crate::{
    checkpoint::{
        CheckpointCadence, CheckpointError, CheckpointTrigger, CheckpointVersion,
        CheckpointWriter, PersistenceBackend, PersistenceError,
    },
    classify::Classifier,
    shutdown::ShutdownSignal,
    sinks::SnapshotSink,
    sources::{BatchSource, SourceError},
    state::StateStore,
    types::{Batch, Event, Label, TickId},
};

/// Lifecycle of an [AggregationEngine]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Accepting batches
    Running,
    /// The final checkpoint was written, no more batches are accepted
    Stopped,
}

/// Outcome of processing one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Tick the batch belonged to
    pub tick: TickId,
    /// Events in the batch
    pub events: usize,
    /// Events which were assigned a label
    pub matched: usize,
    /// Events containing no keyword
    pub unmatched: usize,
    /// Events which could not be classified
    pub skipped: usize,
    /// Whether the sink accepted the snapshot
    pub published: bool,
    /// Checkpoint version handed to the writer after this tick, if any
    pub checkpoint: Option<CheckpointVersion>,
}

/// Totals over all ticks of a [run](AggregationEngine::run)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches processed
    pub ticks: u64,
    /// Events seen in all batches
    pub events: u64,
    /// Events counted
    pub matched: u64,
    /// Events without a keyword
    pub unmatched: u64,
    /// Events skipped because of classification errors
    pub skipped: u64,
    /// Snapshots the sink failed to record
    pub sink_failures: u64,
    /// Checkpoints requested during the run, not counting the final one
    pub checkpoints: u64,
    /// Last committed checkpoint when the run ended
    pub final_checkpoint: Option<CheckpointVersion>,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.events += report.events as u64;
        self.matched += report.matched as u64;
        self.unmatched += report.unmatched as u64;
        self.skipped += report.skipped as u64;
        if !report.published {
            self.sink_failures += 1;
        }
        if report.checkpoint.is_some() {
            self.checkpoints += 1;
        }
    }
}

/// Per-batch counts, pre-aggregated before they touch the store
#[derive(Default)]
struct Tally {
    counts: IndexMap<Label, u64>,
    unmatched: usize,
    skipped: usize,
}

impl Tally {
    fn merge(mut self, other: Tally) -> Tally {
        for (label, n) in other.counts {
            *self.counts.entry(label).or_default() += n;
        }
        self.unmatched += other.unmatched;
        self.skipped += other.skipped;
        self
    }

    fn matched(&self) -> usize {
        self.counts.values().sum::<u64>() as usize
    }
}

/// Counts (topic, sentiment) labels over a stream of batches.
///
/// The engine restores its counts from the last committed checkpoint when it is built. Every
/// batch is classified on a worker pool, added to the [StateStore] and the resulting snapshot
/// is handed to a [SnapshotSink]. Checkpoints are written on a background thread, so a slow
/// disk does not delay the next tick.
///
/// # Example
/// ```rust
/// use hashtide::{
///     checkpoint::InMemoryBackend,
///     classify::{Classifier, KeywordTable, LexiconScorer},
///     sinks::VecSink,
///     sources::IteratorSource,
///     AggregationEngine,
/// };
///
/// let keywords = KeywordTable::new(["vote", "election"]).unwrap();
/// let classifier = Classifier::new(keywords, LexiconScorer::default());
/// let mut engine = AggregationEngine::builder()
///     .classifier(classifier)
///     .persistence(InMemoryBackend::default())
///     .build()
///     .unwrap();
///
/// let mut source = IteratorSource::new(vec![vec!["vote today"], vec!["election night"]]);
/// let mut sink = VecSink::new();
/// let summary = engine.run(&mut source, &mut sink).unwrap();
/// assert_eq!(summary.ticks, 2);
/// assert_eq!(engine.store().total(), 2);
/// ```
pub struct AggregationEngine {
    classifier: Classifier,
    store: StateStore,
    trigger: Box<dyn CheckpointTrigger>,
    writer: CheckpointWriter,
    next_version: CheckpointVersion,
    last_committed: Option<CheckpointVersion>,
    pool: rayon::ThreadPool,
    shutdown: ShutdownSignal,
    state: EngineState,
}

#[bon]
impl AggregationEngine {
    /// Build an engine, restoring counts from the last committed checkpoint of `persistence`.
    ///
    /// A checkpoint which can not be decoded is logged and ignored, the engine then starts
    /// with empty counts. Failing to read the checkpoint storage at all is an error.
    #[builder]
    pub fn new<P: PersistenceBackend>(
        classifier: Classifier,
        persistence: P,
        /// How often to checkpoint. Ignored if a custom `trigger` is given.
        #[builder(default)]
        cadence: CheckpointCadence,
        /// Custom checkpoint trigger
        trigger: Option<Box<dyn CheckpointTrigger>>,
        /// Signal stopping [run](AggregationEngine::run). A new one is created if not given.
        shutdown: Option<ShutdownSignal>,
        /// Classification threads, defaults to one per CPU
        workers: Option<usize>,
    ) -> Result<Self, EngineError> {
        let last_committed = persistence.last_committed()?;
        let next_version = persistence.next_version()?;
        let store = match last_committed {
            Some(version) => restore(&persistence, version)?,
            None => {
                info!("No committed checkpoint, starting with empty counts");
                StateStore::new()
            }
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or(0))
            .thread_name(|i| format!("hashtide-classify-{i}"))
            .build()?;
        let writer = CheckpointWriter::spawn(persistence)?;
        Ok(Self {
            classifier,
            store,
            trigger: trigger.unwrap_or_else(|| cadence.into_trigger()),
            writer,
            next_version,
            last_committed,
            pool,
            shutdown: shutdown.unwrap_or_default(),
            state: EngineState::Running,
        })
    }
}

fn restore<P: PersistenceBackend>(
    persistence: &P,
    version: CheckpointVersion,
) -> Result<StateStore, EngineError> {
    let Some(blob) = persistence.load(version)? else {
        warn!("Committed checkpoint version {version} is missing, starting with empty counts");
        return Ok(StateStore::new());
    };
    match StateStore::from_checkpoint(&blob) {
        Ok(store) => {
            info!(
                "Restored {} labels from checkpoint version {version}",
                store.snapshot().len()
            );
            Ok(store)
        }
        Err(e) => {
            warn!("Checkpoint version {version} is corrupt, starting with empty counts: {e}");
            Ok(StateStore::new())
        }
    }
}

impl AggregationEngine {
    /// The counts accumulated so far
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// A handle to the signal stopping this engine
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Last checkpoint version known to be committed
    pub fn last_committed(&self) -> Option<CheckpointVersion> {
        self.last_committed
    }

    /// Process a single batch: classify and count its events, publish the snapshot to `sink`
    /// and checkpoint if the trigger fires.
    ///
    /// Events which can not be classified are skipped and a failing sink is logged, neither
    /// fails the tick. A failed background checkpoint does.
    pub fn process_batch<S: SnapshotSink + ?Sized>(
        &mut self,
        batch: Batch,
        sink: &mut S,
    ) -> Result<TickReport, EngineError> {
        if self.state == EngineState::Stopped {
            return Err(EngineError::Stopped);
        }
        let span = debug_span!("engine::tick", tick = batch.tick);
        let _guard = span.enter();

        let tally = self.classify_all(batch.tick, &batch.events);
        for (label, n) in tally.counts.iter() {
            self.store.increment(*label, *n);
        }
        let snapshot = self.store.snapshot();
        let published = match sink.publish(batch.timestamp, &snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("Snapshot of tick {} was not recorded: {e}", batch.tick);
                false
            }
        };

        let checkpoint = if self.trigger.should_trigger() {
            self.request_checkpoint()
        } else {
            None
        };
        self.poll_writer()?;

        let report = TickReport {
            tick: batch.tick,
            events: batch.len(),
            matched: tally.matched(),
            unmatched: tally.unmatched,
            skipped: tally.skipped,
            published,
            checkpoint,
        };
        debug!(
            "Processed {} events, {} matched, {} labels total",
            report.events,
            report.matched,
            snapshot.len()
        );
        Ok(report)
    }

    /// Process batches from `source` until it is finished, the shutdown signal fires or the
    /// feed disconnects. The engine is stopped afterwards, writing a final checkpoint.
    ///
    /// A disconnected feed still stops the engine cleanly, but is returned as
    /// [EngineError::SourceDisconnected].
    pub fn run<B, S>(&mut self, source: &mut B, sink: &mut S) -> Result<RunSummary, EngineError>
    where
        B: BatchSource + ?Sized,
        S: SnapshotSink + ?Sized,
    {
        if self.state == EngineState::Stopped {
            return Err(EngineError::Stopped);
        }
        info!("Engine running");
        let mut summary = RunSummary::default();
        while !self.shutdown.is_triggered() {
            match source.next_batch(&self.shutdown) {
                Ok(Some(batch)) => {
                    let report = self.process_batch(batch, sink)?;
                    summary.record(&report);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Lost event feed: {e}");
                    self.stop()?;
                    return Err(EngineError::SourceDisconnected(e));
                }
            }
        }
        summary.final_checkpoint = self.stop()?;
        info!(
            "Engine stopped after {} ticks, {} events counted",
            summary.ticks, summary.matched
        );
        Ok(summary)
    }

    /// Stop accepting batches and synchronously write a final checkpoint.
    /// Returns the last committed version. Calling this again has no effect.
    pub fn stop(&mut self) -> Result<Option<CheckpointVersion>, EngineError> {
        if self.state == EngineState::Stopped {
            return Ok(self.last_committed);
        }
        self.state = EngineState::Stopped;
        self.shutdown.trigger();
        let version = self.next_version;
        self.next_version += 1;
        let result = self.writer.finish(Some((version, self.store.checkpoint())));
        self.record_commits();
        result?;
        Ok(self.last_committed)
    }

    fn classify_all(&self, tick: TickId, events: &[Event]) -> Tally {
        let classifier = &self.classifier;
        self.pool.install(|| {
            events
                .par_iter()
                .fold(Tally::default, |mut tally, event| {
                    match classifier.classify_event(event) {
                        Ok(Some(label)) => *tally.counts.entry(label).or_default() += 1,
                        Ok(None) => tally.unmatched += 1,
                        Err(e) => {
                            warn!("Skipping event in tick {tick}: {e}");
                            tally.skipped += 1;
                        }
                    }
                    tally
                })
                .reduce(Tally::default, Tally::merge)
        })
    }

    fn request_checkpoint(&mut self) -> Option<CheckpointVersion> {
        let version = self.next_version;
        if self.writer.submit(version, self.store.checkpoint()) {
            self.next_version += 1;
            debug!("Requested checkpoint version {version}");
            Some(version)
        } else {
            debug!("Checkpoint writer busy, skipping checkpoint");
            None
        }
    }

    fn poll_writer(&mut self) -> Result<(), EngineError> {
        let result = self.writer.poll();
        self.record_commits();
        if let Some(v) = result? {
            info!("Committed checkpoint version {v}");
        }
        Ok(())
    }

    fn record_commits(&mut self) {
        if let Some(v) = self.writer.last_committed() {
            self.last_committed = Some(v);
        }
    }
}

impl std::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("state", &self.state)
            .field("labels", &self.store.snapshot().len())
            .field("next_version", &self.next_version)
            .field("last_committed", &self.last_committed)
            .finish_non_exhaustive()
    }
}

/// Errors ending an engine run
#[derive(Debug, Error)]
pub enum EngineError {
    /// Checkpoint storage could not be read at startup
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// Writing a checkpoint failed
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    /// The event feed went away. The final checkpoint was still written.
    #[error("Event feed lost: {0}")]
    SourceDisconnected(SourceError),
    /// The engine was already stopped
    #[error("Engine is stopped")]
    Stopped,
    /// The classification pool could not be started
    #[error("Cannot start classification workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
