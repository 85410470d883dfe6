//! Many files, one request, bounded parallelism.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::filter::InstrumentFilter;
use crate::orchestrator::{CategorySelector, MetricOrchestrator, ModeSelector};
use crate::resolve::{FileRef, ScoreResolver};
use crate::value::MetricResult;

/// A file that analyzed successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: FileRef,
    pub instruments: Vec<String>,
    pub metrics: MetricResult,
}

/// A file that could not be analyzed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub file: FileRef,
    pub instruments: Vec<String>,
    pub reason: String,
}

/// Results and failures, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<FileReport>,
    pub errors: Vec<FileError>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Outcome = Result<FileReport, FileError>;

pub struct BatchRunner {
    orchestrator: MetricOrchestrator,
    resolver: Arc<dyn ScoreResolver>,
    pool: ThreadPool,
}

impl BatchRunner {
    /// `worker_threads == 0` uses every available core.
    pub fn new(
        orchestrator: MetricOrchestrator,
        resolver: Arc<dyn ScoreResolver>,
        worker_threads: usize,
    ) -> anyhow::Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_threads)
            .thread_name(|i| format!("smartscore-batch-{i}"))
            .build()?;
        Ok(Self {
            orchestrator,
            resolver,
            pool,
        })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Analyze every file with the same request. One file failing never
    /// affects the others.
    pub fn analyze_batch(
        &self,
        files: &[FileRef],
        filter: &InstrumentFilter,
        category: CategorySelector,
        mode: ModeSelector,
    ) -> BatchReport {
        info!(
            files = files.len(),
            threads = self.worker_threads(),
            %category,
            %mode,
            "starting batch"
        );

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| self.analyze_one(file, filter, category, mode))
                .collect()
        });

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(error) => report.errors.push(error),
            }
        }

        info!(
            succeeded = report.results.len(),
            failed = report.errors.len(),
            "batch finished"
        );
        report
    }

    fn analyze_one(
        &self,
        file: &FileRef,
        filter: &InstrumentFilter,
        category: CategorySelector,
        mode: ModeSelector,
    ) -> Outcome {
        let instruments = filter.names().to_vec();
        let work = self.resolver.resolve(file).map_err(|e| {
            warn!(file = %file, error = %e, "skipping file");
            FileError {
                file: file.clone(),
                instruments: instruments.clone(),
                reason: e.to_string(),
            }
        })?;

        let metrics =
            self.orchestrator
                .analyze(&work.score, &work.performance, filter, category, mode);
        Ok(FileReport {
            file: file.clone(),
            instruments,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::orchestrator::{Category, Granularity};
    use score_model::{DecodedWork, Note, Part, PerformanceTrack, Score};

    /// Serves a fixed score for every name except `missing*`.
    struct Fixture;

    impl ScoreResolver for Fixture {
        fn resolve(&self, file: &FileRef) -> Result<DecodedWork, ResolutionError> {
            if file.as_str().starts_with("missing") {
                return Err(ResolutionError::NotFound(file.to_string()));
            }
            let score = Score::new(vec![Part::new(
                "Piano",
                vec![Note::new(60, 0.0, 1.0), Note::new(64, 1.0, 1.0)],
            )])
            .unwrap();
            let performance = PerformanceTrack::from_score(&score);
            Ok(DecodedWork { score, performance })
        }
    }

    fn runner(threads: usize) -> BatchRunner {
        BatchRunner::new(MetricOrchestrator::new().unwrap(), Arc::new(Fixture), threads).unwrap()
    }

    #[test]
    fn failures_are_isolated_and_order_kept() {
        let files: Vec<FileRef> = ["a.mid", "missing.mid", "b.mid", "c.mid"]
            .into_iter()
            .map(FileRef::from)
            .collect();
        let report = runner(2).analyze_batch(
            &files,
            &InstrumentFilter::all(),
            CategorySelector::One(Category::Melodic),
            ModeSelector::One(Granularity::Global),
        );

        let names: Vec<&str> = report.results.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(names, ["a.mid", "b.mid", "c.mid"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].file.as_str(), "missing.mid");
        assert!(report.errors[0].reason.contains("missing.mid"));
    }

    #[test]
    fn zero_threads_means_all_cores() {
        assert!(runner(0).worker_threads() >= 1);
        assert_eq!(runner(3).worker_threads(), 3);
    }

    #[test]
    fn empty_batch() {
        let report = runner(1).analyze_batch(
            &[],
            &InstrumentFilter::all(),
            CategorySelector::All,
            ModeSelector::All,
        );
        assert!(report.is_empty());
    }

    #[test]
    fn report_shape() {
        let report = runner(1).analyze_batch(
            &["missing.mid".into()],
            &InstrumentFilter::new(["Piano"]),
            CategorySelector::One(Category::Instrumental),
            ModeSelector::One(Granularity::Global),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"], serde_json::json!([]));
        assert_eq!(json["errors"][0]["file"], "missing.mid");
        assert_eq!(json["errors"][0]["instruments"], serde_json::json!(["Piano"]));
    }
}
