//! Content-addressed analysis lifecycle: ingest, query, evict.
//!
//! Files enter through [`AnalysisEngine::ingest`] and are referred to by
//! hash afterwards. Results are cached per `(hash, request, version)`; the
//! engine never evicts on its own.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cas::{CasConfig, ContentHash, ContentStore, FileStore};
use score_model::DecodedWork;

use crate::batch::BatchRunner;
use crate::cache::ResultCache;
use crate::filter::part_names;
use crate::orchestrator::{AnalysisRequest, MetricOrchestrator};
use crate::resolve::{decode_bytes, CasResolver, FileRef, ScoreResolver};
use crate::value::MetricResult;

/// Bumped whenever a metric changes meaning, invalidating cached results.
pub const CURRENT_VERSION: u32 = 1;

pub const MIDI_MIME: &str = "audio/midi";

/// What an eviction removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eviction {
    pub cached_results: usize,
    pub object_removed: bool,
}

pub struct AnalysisEngine {
    store: Arc<dyn ContentStore>,
    resolver: Arc<CasResolver<Arc<dyn ContentStore>>>,
    cache: ResultCache,
    orchestrator: MetricOrchestrator,
}

impl AnalysisEngine {
    pub fn new(store: Arc<dyn ContentStore>, cache: ResultCache) -> Result<Self> {
        let orchestrator = MetricOrchestrator::new().context("building metric table")?;
        Ok(Self {
            resolver: Arc::new(CasResolver::new(Arc::clone(&store))),
            store,
            cache,
            orchestrator,
        })
    }

    /// File-backed store and cache.
    pub fn open(cas_dir: &Path, cache_db: &Path) -> Result<Self> {
        let store = FileStore::new(CasConfig::with_base_path(cas_dir))
            .with_context(|| format!("opening CAS at {}", cas_dir.display()))?;
        let cache = ResultCache::open(cache_db)
            .with_context(|| format!("opening cache at {}", cache_db.display()))?;
        info!(cas = %cas_dir.display(), cache = %cache_db.display(), "engine opened");
        Self::new(Arc::new(store), cache)
    }

    pub fn orchestrator(&self) -> &MetricOrchestrator {
        &self.orchestrator
    }

    /// Validate and store a file. Undecodable bytes are rejected before
    /// they reach the store.
    pub fn ingest(&self, bytes: &[u8]) -> Result<ContentHash> {
        let work = decode_bytes(&FileRef::new("<upload>"), bytes)?;
        let hash = self.store.store(bytes, MIDI_MIME)?;
        info!(
            hash = %hash,
            bytes = bytes.len(),
            parts = work.score.parts().len(),
            "ingested"
        );
        Ok(hash)
    }

    fn load(&self, hash: &ContentHash) -> Result<DecodedWork> {
        Ok(self.resolver.resolve(&FileRef::from(hash))?)
    }

    /// Answer a request whose `file` is a content hash, from cache when possible.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<MetricResult> {
        let hash: ContentHash = request
            .file
            .parse()
            .with_context(|| format!("'{}' is not a content hash", request.file))?;
        let key = request.request_key();

        if let Some(cached) = self.cache.get(hash.as_str(), &key, CURRENT_VERSION)? {
            debug!(hash = %hash, request = %key, "cache hit");
            return Ok(cached);
        }

        let work = self.load(&hash)?;
        let result = self.orchestrator.analyze(
            &work.score,
            &work.performance,
            &request.instruments,
            request.category,
            request.mode,
        );
        self.cache
            .put(hash.as_str(), &key, CURRENT_VERSION, &result)?;
        info!(hash = %hash, request = %key, metrics = result.len(), "analyzed");
        Ok(result)
    }

    /// Part names of a stored file, in score order without duplicates.
    pub fn instruments(&self, hash: &ContentHash) -> Result<Vec<String>> {
        Ok(part_names(&self.load(hash)?.score))
    }

    /// Drop cached results and the stored object.
    pub fn evict(&self, hash: &ContentHash) -> Result<Eviction> {
        let cached_results = self.cache.evict(hash.as_str())?;
        let object_removed = self.store.remove(hash)?;
        info!(hash = %hash, cached_results, object_removed, "evicted");
        Ok(Eviction {
            cached_results,
            object_removed,
        })
    }

    /// A batch runner over stored files, addressed by hash.
    pub fn batch_runner(&self, worker_threads: usize) -> Result<BatchRunner> {
        let resolver: Arc<dyn ScoreResolver> = self.resolver.clone();
        BatchRunner::new(self.orchestrator.clone(), resolver, worker_threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::InstrumentFilter;
    use score_model::{Note, Part, Score};
    use tempfile::TempDir;

    fn midi() -> Vec<u8> {
        let score = Score::new(vec![
            Part::new("Piano", vec![Note::new(60, 0.0, 1.0), Note::new(62, 1.0, 1.0)]),
            Part::new("Violin", vec![Note::new(67, 0.0, 2.0)]),
        ])
        .unwrap();
        score_model::encode(&score)
    }

    fn engine(dir: &TempDir) -> AnalysisEngine {
        AnalysisEngine::open(&dir.path().join("cas"), &dir.path().join("cache.db")).unwrap()
    }

    fn request(hash: &ContentHash) -> AnalysisRequest {
        AnalysisRequest::parse(hash.to_string(), InstrumentFilter::all(), "melodic", "global")
            .unwrap()
    }

    #[test]
    fn ingest_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(engine.ingest(b"").is_err());
        assert!(engine.ingest(b"definitely not midi").is_err());
    }

    #[test]
    fn ingest_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert_eq!(engine.ingest(&midi()).unwrap(), engine.ingest(&midi()).unwrap());
    }

    #[test]
    fn analyze_caches_results() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let hash = engine.ingest(&midi()).unwrap();

        let first = engine.analyze(&request(&hash)).unwrap();
        assert!(first.contains("melodic_entropy"));
        assert_eq!(engine.cache.count(hash.as_str()).unwrap(), 1);

        let second = engine.analyze(&request(&hash)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn instruments_in_order() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let hash = engine.ingest(&midi()).unwrap();
        assert_eq!(engine.instruments(&hash).unwrap(), ["Piano", "Violin"]);
    }

    #[test]
    fn evict_removes_everything() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let hash = engine.ingest(&midi()).unwrap();
        engine.analyze(&request(&hash)).unwrap();

        let eviction = engine.evict(&hash).unwrap();
        assert_eq!(
            eviction,
            Eviction {
                cached_results: 1,
                object_removed: true
            }
        );
        assert!(engine.analyze(&request(&hash)).is_err());
        assert!(!engine.evict(&hash).unwrap().object_removed);
    }

    #[test]
    fn analyze_rejects_non_hash() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let request =
            AnalysisRequest::parse("song.mid", InstrumentFilter::all(), "all", "all").unwrap();
        assert!(engine.analyze(&request).is_err());
    }
}
