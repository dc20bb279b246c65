//! Count a few pre-built batches and print every snapshot
use hashtide::{
    checkpoint::{CheckpointCadence, InMemoryBackend},
    classify::{Classifier, KeywordTable, LexiconScorer},
    sinks::{RenderOptions, StdOutSink},
    sources::IteratorSource,
    AggregationEngine,
};

fn main() {
    tracing_subscriber::fmt::init();

    let keywords = KeywordTable::new([
        // politics
        "vote", "election", "senate", "president", "congress", "ballot", "campaign", "policy",
        "debate", "governor",
        // sports
        "goal", "nba", "nfl", "match", "league", "coach", "team", "season", "cup", "score",
        // technology
        "python", "rust", "ai", "software", "cloud", "robot", "chip", "startup", "app", "data",
        // covid-19
        "covid", "virus", "vaccine", "mask", "lockdown", "quarantine", "pandemic", "cases",
        "outbreak", "hospital",
    ])
    .unwrap();
    let classifier = Classifier::new(keywords, LexiconScorer::default());
    let backend = InMemoryBackend::default();
    let mut engine = AggregationEngine::builder()
        .classifier(classifier)
        .persistence(backend.clone())
        .cadence(CheckpointCadence::EveryNTicks(2))
        .build()
        .unwrap();

    let mut source = IteratorSource::new(vec![
        vec!["the new vaccine looks great", "rust is a great language"],
        vec!["terrible lockdown news", "vote for python today"],
        vec!["nothing to count here"],
    ]);
    let mut sink = StdOutSink::new(RenderOptions {
        sort_by_count: true,
        ..Default::default()
    });
    let summary = engine.run(&mut source, &mut sink).unwrap();
    println!("{summary:?}");
    println!("committed checkpoints: {:?}", backend.commits());
}
