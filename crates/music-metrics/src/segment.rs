//! Measure segmentation.
//!
//! Symbolic buckets follow the score's canonical grid. The performance
//! timeline has no measures of its own, so it gets proportional windows:
//! the track duration divided evenly by the symbolic measure count. Those
//! buckets carry [`Alignment::Proportional`] so callers can tell them apart.

use serde::Serialize;

use score_model::{Measure, MusicalEvent, PerformanceInstrument, PerformanceNote};

use crate::filter::{PerformanceView, ScoreView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Boundaries come from real measures
    Symbolic,
    /// Boundaries are an even division of performance time
    Proportional,
}

/// Items whose onset fell in one measure.
#[derive(Debug, Clone)]
pub struct Bucket<T> {
    /// 1-based measure index
    pub measure: usize,
    pub start: f64,
    pub end: f64,
    pub items: Vec<T>,
}

/// One bucket per measure, ordered by measure index.
#[derive(Debug, Clone)]
pub struct Buckets<T> {
    alignment: Alignment,
    buckets: Vec<Bucket<T>>,
}

impl<T> Buckets<T> {
    fn over(measures: &[Measure], alignment: Alignment) -> Self {
        let buckets = measures
            .iter()
            .map(|m| Bucket {
                measure: m.index,
                start: m.start,
                end: m.end(),
                items: Vec::new(),
            })
            .collect();
        Self { alignment, buckets }
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket<T>> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total number of items across all buckets.
    pub fn item_count(&self) -> usize {
        self.buckets.iter().map(|b| b.items.len()).sum()
    }
}

/// Position of the measure containing `onset`. Onsets before the first
/// boundary land in the first measure, after the last in the last.
fn locate(measures: &[Measure], onset: f64) -> Option<usize> {
    if measures.is_empty() {
        return None;
    }
    let after = measures.partition_point(|m| m.start <= onset);
    Some(after.saturating_sub(1).min(measures.len() - 1))
}

/// Group arbitrary items into `grid` measures by their onset.
pub fn bucket_by_onset<T>(
    grid: &[Measure],
    items: impl IntoIterator<Item = T>,
    onset: impl Fn(&T) -> f64,
) -> Buckets<T> {
    let mut buckets = Buckets::over(grid, Alignment::Symbolic);
    for item in items {
        if let Some(slot) = locate(grid, onset(&item)) {
            buckets.buckets[slot].items.push(item);
        }
    }
    buckets
}

/// Partition the view's events into the score's measure grid.
///
/// Each part is located against its own measures when it has them (same
/// index maps to the same grid slot), otherwise against the grid. Buckets
/// concatenate parts in view order.
pub fn segment_score<'a>(view: &ScoreView<'a>) -> Buckets<&'a MusicalEvent> {
    let grid = view.grid();
    let mut buckets = Buckets::over(grid, Alignment::Symbolic);
    if grid.is_empty() {
        return buckets;
    }

    for part in view.parts() {
        let measures = match part.measures() {
            [] => grid,
            own => own,
        };
        for event in part.events() {
            if let Some(position) = locate(measures, event.onset()) {
                let slot = position.min(grid.len() - 1);
                buckets.buckets[slot].items.push(event);
            }
        }
    }

    buckets
}

/// A performed note together with the instrument that played it.
#[derive(Debug, Clone, Copy)]
pub struct PerformedNote<'a> {
    pub instrument: &'a PerformanceInstrument,
    pub note: &'a PerformanceNote,
}

/// Divide the performance into `measure_count` equal windows of the full
/// track's duration and assign the view's notes by start time.
pub fn segment_performance<'a>(
    view: &PerformanceView<'a>,
    measure_count: usize,
) -> Buckets<PerformedNote<'a>> {
    if measure_count == 0 {
        return Buckets {
            alignment: Alignment::Proportional,
            buckets: Vec::new(),
        };
    }

    let total = view.track().total_duration();
    let width = total / measure_count as f64;

    let mut buckets: Vec<Bucket<PerformedNote<'a>>> = (0..measure_count)
        .map(|i| Bucket {
            measure: i + 1,
            start: i as f64 * width,
            end: (i + 1) as f64 * width,
            items: Vec::new(),
        })
        .collect();

    for &instrument in view.instruments() {
        for note in &instrument.notes {
            let slot = if width > 0.0 {
                ((note.start / width).floor().max(0.0) as usize).min(measure_count - 1)
            } else {
                0
            };
            buckets[slot].items.push(PerformedNote { instrument, note });
        }
    }

    Buckets {
        alignment: Alignment::Proportional,
        buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::InstrumentFilter;
    use score_model::{Note, Part, PerformanceTrack, Score, TimeSignature};

    fn two_part_score() -> Score {
        let piano = Part::new(
            "Piano",
            (0..8).map(|i| Note::new(60 + i as u8, i as f64, 1.0)).collect::<Vec<_>>(),
        );
        let violin = Part::new(
            "Violin",
            vec![Note::new(72, 0.5, 1.0), Note::new(74, 5.0, 1.0), Note::new(76, 7.5, 0.5)],
        );
        Score::new(vec![piano, violin]).unwrap()
    }

    #[test]
    fn buckets_are_disjoint_and_cover_every_event() {
        let score = two_part_score();
        let view = InstrumentFilter::all().view(&score);
        let buckets = segment_score(&view);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.alignment(), Alignment::Symbolic);
        assert_eq!(buckets.item_count(), view.events().count());

        let first: Vec<f64> = buckets.iter().next().unwrap().items.iter().map(|e| e.onset()).collect();
        // Piano first, then violin
        assert_eq!(first, vec![0.0, 1.0, 2.0, 3.0, 0.5]);
    }

    #[test]
    fn out_of_grid_events_are_clamped() {
        let grid = Measure::regular_grid(8.0, TimeSignature::COMMON, true);
        let late = Part::new("Oboe", vec![Note::new(70, 20.0, 1.0)]).with_measures(grid.clone());
        let reference = Part::new("Flute", vec![Note::new(72, 0.0, 8.0)]).with_measures(grid);
        let score = Score::new(vec![reference, late]).unwrap();
        let buckets = segment_score(&InstrumentFilter::all().view(&score));

        assert_eq!(buckets.iter().last().unwrap().items.len(), 1);
        assert_eq!(buckets.item_count(), 2);
    }

    #[test]
    fn part_measures_map_by_index() {
        // Reference grid in 4/4, second part notated in 2/4
        let reference = Part::new("Flute", vec![Note::new(72, 0.0, 8.0)])
            .with_measures(Measure::regular_grid(8.0, TimeSignature::COMMON, true));
        let halves = Part::new("Horn", vec![Note::new(60, 2.5, 1.0)])
            .with_measures(Measure::regular_grid(4.0, TimeSignature::new(2, 4), true));
        let score = Score::new(vec![reference, halves]).unwrap();
        let buckets = segment_score(&InstrumentFilter::all().view(&score));

        // Onset 2.5 is in the horn's second measure
        let second = buckets.iter().nth(1).unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].pitches(), &[60]);
    }

    #[test]
    fn proportional_windows_split_track_time() {
        let score = two_part_score();
        let track = PerformanceTrack::from_score(&score);
        let view = InstrumentFilter::all().performance_view(&track);
        let buckets = segment_performance(&view, 2);

        assert_eq!(buckets.alignment(), Alignment::Proportional);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.item_count(), 11);
        assert!((buckets.iter().next().unwrap().end - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_measures_means_no_windows() {
        let track = PerformanceTrack::new(Vec::new(), 120.0);
        let view = InstrumentFilter::all().performance_view(&track);
        assert!(segment_performance(&view, 0).is_empty());
    }
}
