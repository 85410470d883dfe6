//! Per-request analysis context.
//!
//! Holds the filtered views plus lazily built derived data (segmentations,
//! sonorities) so categories that share them compute each only once.

use std::cell::OnceCell;

use score_model::MusicalEvent;

use crate::filter::{InstrumentFilter, PerformanceView, ScoreView};
use crate::harmony::{chordify, Sonority};
use crate::segment::{bucket_by_onset, segment_performance, segment_score, Buckets, PerformedNote};

pub struct AnalysisContext<'a> {
    view: ScoreView<'a>,
    performance: PerformanceView<'a>,
    measures: OnceCell<Buckets<&'a MusicalEvent>>,
    windows: OnceCell<Buckets<PerformedNote<'a>>>,
    sonorities: OnceCell<Vec<Sonority>>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(view: ScoreView<'a>, performance: PerformanceView<'a>) -> Self {
        Self {
            view,
            performance,
            measures: OnceCell::new(),
            windows: OnceCell::new(),
            sonorities: OnceCell::new(),
        }
    }

    pub fn filtered(
        score: &'a score_model::Score,
        track: &'a score_model::PerformanceTrack,
        filter: &InstrumentFilter,
    ) -> Self {
        Self::new(filter.view(score), filter.performance_view(track))
    }

    pub fn view(&self) -> &ScoreView<'a> {
        &self.view
    }

    pub fn performance(&self) -> &PerformanceView<'a> {
        &self.performance
    }

    /// Number of measures in the canonical grid.
    pub fn measure_count(&self) -> usize {
        self.view.grid().len()
    }

    /// The view's events bucketed by measure.
    pub fn measures(&self) -> &Buckets<&'a MusicalEvent> {
        self.measures.get_or_init(|| segment_score(&self.view))
    }

    /// Performance notes in proportional windows, one per grid measure.
    pub fn windows(&self) -> &Buckets<PerformedNote<'a>> {
        self.windows
            .get_or_init(|| segment_performance(&self.performance, self.measure_count()))
    }

    pub fn sonorities(&self) -> &[Sonority] {
        self.sonorities.get_or_init(|| chordify(self.view.events()))
    }

    /// Sonorities grouped by the grid measure of their onset.
    pub fn sonorities_by_measure(&self) -> Buckets<&Sonority> {
        bucket_by_onset(self.view.grid(), self.sonorities(), |s| s.onset)
    }
}
