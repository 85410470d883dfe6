//! Descriptor taxonomy over symbolic musical works.
//!
//! Metrics are grouped into nine categories (melodic, rhythmic, harmonic,
//! ...) and three granularities: whole work, coarse aggregate and
//! per-measure series. The [`MetricOrchestrator`] dispatches a request to a
//! validated static table; every metric runs under [`invoke`], so a failing
//! metric becomes an error marker under its own name instead of aborting
//! the analysis.
//!
//! ```rust,no_run
//! use music_metrics::{CategorySelector, InstrumentFilter, MetricOrchestrator, ModeSelector};
//!
//! let bytes = std::fs::read("song.mid").unwrap();
//! let work = score_model::decode(&bytes).unwrap();
//! let result = MetricOrchestrator::new().unwrap().analyze(
//!     &work.score,
//!     &work.performance,
//!     &InstrumentFilter::new(["Piano", "Violin"]),
//!     "melodic".parse::<CategorySelector>().unwrap(),
//!     ModeSelector::All,
//! );
//! println!("{}", serde_json::to_string_pretty(&result).unwrap());
//! ```
//!
//! Around the core: [`BatchRunner`] fans requests out over files,
//! [`AnalysisEngine`] adds content-addressed ingest with a result cache.

pub mod batch;
pub mod cache;
pub mod categories;
pub mod cluster;
pub mod context;
pub mod engine;
pub mod error;
pub mod filter;
pub mod harmony;
pub mod invoke;
pub mod orchestrator;
pub mod resolve;
pub mod segment;
pub mod stats;
pub mod value;

pub use batch::{BatchReport, BatchRunner, FileError, FileReport};
pub use cache::ResultCache;
pub use context::AnalysisContext;
pub use engine::{AnalysisEngine, Eviction, CURRENT_VERSION};
pub use error::{InvalidRequestError, MetricError, ResolutionError, TableError};
pub use filter::{part_names, InstrumentFilter, PerformanceView, ScoreView};
pub use invoke::invoke;
pub use orchestrator::{
    AnalysisRequest, Category, CategorySelector, Granularity, MetricOrchestrator, MetricTable,
    ModeSelector,
};
pub use resolve::{CasResolver, DirectoryResolver, FileRef, ScoreResolver};
pub use segment::Alignment;
pub use value::{MetricResult, MetricValue};
