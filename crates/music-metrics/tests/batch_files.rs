//! Batches over real MIDI files on disk and in the content store.

use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use music_metrics::{
    AnalysisEngine, AnalysisRequest, BatchRunner, Category, CategorySelector, DirectoryResolver,
    FileRef, Granularity, InstrumentFilter, MetricOrchestrator, ModeSelector,
};
use score_model::{Chord, MusicalEvent, Note, Part, Score};

fn song(offset: u8) -> Vec<u8> {
    let score = Score::new(vec![
        Part::new(
            "Piano",
            vec![
                MusicalEvent::from(Chord::new(vec![48 + offset, 52 + offset, 55 + offset], 0.0, 2.0)),
                Chord::new(vec![53 + offset, 57 + offset, 60 + offset], 2.0, 2.0).into(),
            ],
        ),
        Part::new(
            "Violin",
            vec![
                Note::new(72 + offset, 0.0, 1.0),
                Note::new(74 + offset, 1.0, 1.0),
                Note::new(76 + offset, 2.0, 2.0),
            ],
        )
        .with_program(40),
    ])
    .unwrap();
    score_model::encode(&score)
}

fn melodic_global() -> (CategorySelector, ModeSelector) {
    (
        CategorySelector::One(Category::Melodic),
        ModeSelector::One(Granularity::Global),
    )
}

#[test]
fn unresolvable_file_is_reported_between_successes() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("one.mid"), song(0)).unwrap();
    fs::write(dir.path().join("three.mid"), song(2)).unwrap();

    let runner = BatchRunner::new(
        MetricOrchestrator::new().unwrap(),
        Arc::new(DirectoryResolver::new(dir.path())),
        2,
    )
    .unwrap();
    let files: Vec<FileRef> = ["one.mid", "two.mid", "three.mid"]
        .into_iter()
        .map(FileRef::from)
        .collect();
    let (category, mode) = melodic_global();
    let report = runner.analyze_batch(&files, &InstrumentFilter::all(), category, mode);

    let analyzed: Vec<&str> = report.results.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(analyzed, ["one.mid", "three.mid"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].file.as_str(), "two.mid");
    assert!(report.errors[0].reason.contains("not found"));

    for result in &report.results {
        assert!(result.metrics.get("melodic_entropy").unwrap().as_f64().unwrap() > 0.0);
    }
}

#[test]
fn empty_and_corrupt_files_fail_independently() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("empty.mid"), b"").unwrap();
    fs::write(dir.path().join("corrupt.mid"), b"MThd garbage").unwrap();
    fs::write(dir.path().join("good.mid"), song(0)).unwrap();

    let runner = BatchRunner::new(
        MetricOrchestrator::new().unwrap(),
        Arc::new(DirectoryResolver::new(dir.path())),
        0,
    )
    .unwrap();
    let files: Vec<FileRef> = ["empty.mid", "good.mid", "corrupt.mid"]
        .into_iter()
        .map(FileRef::from)
        .collect();
    let report = runner.analyze_batch(
        &files,
        &InstrumentFilter::new(["Violin"]),
        CategorySelector::All,
        ModeSelector::All,
    );

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].instruments, ["Violin"]);
    let failed: Vec<&str> = report.errors.iter().map(|e| e.file.as_str()).collect();
    assert_eq!(failed, ["empty.mid", "corrupt.mid"]);
}

#[test]
fn engine_batch_over_hashes() {
    let dir = TempDir::new().unwrap();
    let engine =
        AnalysisEngine::open(&dir.path().join("cas"), &dir.path().join("cache.db")).unwrap();
    let first = engine.ingest(&song(0)).unwrap();
    let second = engine.ingest(&song(5)).unwrap();

    let files = vec![
        FileRef::from(&first),
        FileRef::from("0123456789abcdef0123456789abcdef"),
        FileRef::from(&second),
    ];
    let (category, mode) = melodic_global();
    let report = engine
        .batch_runner(1)
        .unwrap()
        .analyze_batch(&files, &InstrumentFilter::all(), category, mode);

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].file.as_str(), "0123456789abcdef0123456789abcdef");
}

#[test]
fn engine_query_matches_direct_analysis() {
    let dir = TempDir::new().unwrap();
    let engine =
        AnalysisEngine::open(&dir.path().join("cas"), &dir.path().join("cache.db")).unwrap();
    let bytes = song(0);
    let hash = engine.ingest(&bytes).unwrap();

    let request =
        AnalysisRequest::parse(hash.to_string(), InstrumentFilter::all(), "harmonic", "all")
            .unwrap();
    let via_engine = engine.analyze(&request).unwrap();

    let work = score_model::decode(&bytes).unwrap();
    let direct = MetricOrchestrator::new().unwrap().analyze(
        &work.score,
        &work.performance,
        &InstrumentFilter::all(),
        request.category,
        request.mode,
    );
    assert_eq!(via_engine, direct);
    assert_eq!(engine.instruments(&hash).unwrap(), ["Piano", "Violin"]);
}
