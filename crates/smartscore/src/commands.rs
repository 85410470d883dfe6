use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use cas::ContentHash;
use music_metrics::resolve::decode_bytes;
use music_metrics::{
    part_names, AnalysisEngine, AnalysisRequest, BatchRunner, CategorySelector,
    DirectoryResolver, FileRef, InstrumentFilter, MetricOrchestrator, ModeSelector,
    ScoreResolver,
};
use scoreconf::{ConfigSources, SmartScoreConfig};

use crate::Selection;

/// Selectors from flags, falling back to the configured defaults.
fn selectors(
    config: &SmartScoreConfig,
    selection: &Selection,
) -> Result<(CategorySelector, ModeSelector)> {
    let category = selection
        .category
        .as_deref()
        .unwrap_or(&config.analysis.default_category);
    let mode = selection
        .mode
        .as_deref()
        .unwrap_or(&config.analysis.default_mode);
    Ok((category.parse()?, mode.parse()?))
}

fn filter(selection: &Selection) -> InstrumentFilter {
    InstrumentFilter::new(&selection.instruments)
}

fn engine(config: &SmartScoreConfig) -> Result<AnalysisEngine> {
    AnalysisEngine::open(&config.paths.cas_dir, &config.paths.cache_db)
}

fn read_local(file: &Path) -> Result<Vec<u8>> {
    fs::read(file).with_context(|| format!("reading {}", file.display()))
}

fn parse_hash(hash: &str) -> Result<ContentHash> {
    hash.parse()
        .with_context(|| format!("'{hash}' is not a content hash"))
}

pub fn analyze(config: &SmartScoreConfig, file: &Path, selection: &Selection) -> Result<Value> {
    let (category, mode) = selectors(config, selection)?;
    let bytes = read_local(file)?;
    let work = decode_bytes(&FileRef::new(file.display().to_string()), &bytes)?;

    let result = MetricOrchestrator::new()?.analyze(
        &work.score,
        &work.performance,
        &filter(selection),
        category,
        mode,
    );
    Ok(serde_json::to_value(result)?)
}

pub fn batch(
    config: &SmartScoreConfig,
    files: &[String],
    dir: Option<PathBuf>,
    stored: bool,
    threads: Option<usize>,
    selection: &Selection,
) -> Result<Value> {
    let (category, mode) = selectors(config, selection)?;
    let threads = threads.unwrap_or(config.analysis.worker_threads);

    let runner = if stored {
        engine(config)?.batch_runner(threads)?
    } else {
        let root = dir.unwrap_or_else(|| config.paths.uploads_dir.clone());
        info!(root = %root.display(), "resolving uploads");
        let resolver: Arc<dyn ScoreResolver> = Arc::new(DirectoryResolver::new(root));
        BatchRunner::new(MetricOrchestrator::new()?, resolver, threads)?
    };

    let files: Vec<FileRef> = files.iter().map(|f| FileRef::new(f.as_str())).collect();
    let report = runner.analyze_batch(&files, &filter(selection), category, mode);
    Ok(serde_json::to_value(report)?)
}

/// A readable local path wins over a hash of the same spelling.
pub fn instruments(config: &SmartScoreConfig, target: &str) -> Result<Value> {
    let path = Path::new(target);
    let names = if path.is_file() {
        let bytes = read_local(path)?;
        part_names(&decode_bytes(&FileRef::new(target), &bytes)?.score)
    } else {
        engine(config)?.instruments(&parse_hash(target)?)?
    };
    Ok(json!(names))
}

pub fn ingest(config: &SmartScoreConfig, file: &Path) -> Result<Value> {
    let bytes = read_local(file)?;
    let engine = engine(config)?;
    let hash = engine.ingest(&bytes)?;
    let instruments = engine.instruments(&hash)?;
    Ok(json!({
        "hash": hash,
        "instruments": instruments,
    }))
}

pub fn query(config: &SmartScoreConfig, hash: &str, selection: &Selection) -> Result<Value> {
    let (category, mode) = selectors(config, selection)?;
    let request = AnalysisRequest {
        file: parse_hash(hash)?.to_string(),
        instruments: filter(selection),
        category,
        mode,
    };
    let result = engine(config)?.analyze(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn evict(config: &SmartScoreConfig, hash: &str) -> Result<Value> {
    let eviction = engine(config)?.evict(&parse_hash(hash)?)?;
    Ok(serde_json::to_value(eviction)?)
}

pub fn print_sources(sources: &ConfigSources) {
    eprintln!("# files:");
    for file in &sources.files {
        eprintln!("#   {}", file.display());
    }
    eprintln!("# environment:");
    for var in &sources.env_overrides {
        eprintln!("#   {var}");
    }
}
