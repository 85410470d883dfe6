//! Statistical primitives. Pure functions, no I/O.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::segment::{Alignment, Buckets};

const SMOOTHING_EPSILON: f64 = 1e-9;

/// Equal-width histogram over `[min, max]` with the last bin closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub low: f64,
    pub high: f64,
}

impl Histogram {
    /// A degenerate range is widened to `[v - 0.5, v + 0.5]`.
    pub fn fixed_bins(samples: &[f64], bins: usize) -> Self {
        let mut counts = vec![0; bins];
        let finite: Vec<f64> = samples.iter().copied().filter(|s| s.is_finite()).collect();
        if bins == 0 || finite.is_empty() {
            return Self {
                counts,
                low: 0.0,
                high: 0.0,
            };
        }

        let mut low = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let mut high = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if low == high {
            low -= 0.5;
            high += 0.5;
        }

        let scale = bins as f64 / (high - low);
        for value in finite {
            let bin = if value >= high {
                bins - 1
            } else {
                (((value - low) * scale) as usize).min(bins - 1)
            };
            counts[bin] += 1;
        }

        Self { counts, low, high }
    }

    pub fn populated(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

/// Shannon entropy in bits of a count distribution, zero bins dropped.
///
/// Rounded to 3 decimals; exactly 0.0 for empty or single-valued input.
pub fn entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let bits: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();
    round_to(bits.max(0.0), 3)
}

/// Unrounded entropy with the epsilon kept inside the logarithm.
pub(crate) fn smoothed_bits(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 || counts.iter().filter(|&&c| c > 0).count() < 2 {
        return 0.0;
    }
    let bits: f64 = counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * (p + SMOOTHING_EPSILON).log2()
        })
        .sum();
    bits.max(0.0)
}

/// Epsilon-smoothed entropy, rounded to 3 decimals.
///
/// Exactly 0.0 when fewer than two bins are populated and never negative.
pub fn entropy_smoothed(counts: &[usize]) -> f64 {
    round_to(smoothed_bits(counts), 3)
}

/// Smoothed entropy of `samples` over `bins` equal-width bins.
pub fn binned_entropy(samples: &[f64], bins: usize) -> f64 {
    entropy_smoothed(&Histogram::fixed_bins(samples, bins).counts)
}

/// Notation used for motifs and other pitch tuples: `60-62-64`.
pub fn motif_notation(pitches: &[u8]) -> String {
    pitches
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join("-")
}

/// Exact-match counts of every contiguous pitch window of one length.
#[derive(Debug, Clone, PartialEq)]
pub struct MotifCounts {
    window: usize,
    windows: usize,
    counts: BTreeMap<Vec<u8>, usize>,
}

/// Count all `max(0, L - window + 1)` windows of `pitches`.
///
/// A window of zero produces no windows at all.
pub fn motif_counts(pitches: &[u8], window: usize) -> MotifCounts {
    let mut counts: BTreeMap<Vec<u8>, usize> = BTreeMap::new();
    let mut windows = 0;
    if window > 0 {
        for motif in pitches.windows(window) {
            *counts.entry(motif.to_vec()).or_default() += 1;
            windows += 1;
        }
    }
    MotifCounts {
        window,
        windows,
        counts,
    }
}

impl MotifCounts {
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of windows examined.
    pub fn window_count(&self) -> usize {
        self.windows
    }

    pub fn count(&self, motif: &[u8]) -> usize {
        self.counts.get(motif).copied().unwrap_or(0)
    }

    /// Motifs seen more than once, keyed by their notation.
    pub fn recurrent(&self) -> BTreeMap<String, usize> {
        self.counts
            .iter()
            .filter(|(_, c)| **c > 1)
            .map(|(m, &c)| (motif_notation(m), c))
            .collect()
    }

    /// Mean occurrence count of the recurrent motifs, 0.0 when there are none.
    pub fn mean_recurrence(&self) -> f64 {
        let repeated: Vec<f64> = self
            .counts
            .values()
            .filter(|&&c| c > 1)
            .map(|&c| c as f64)
            .collect();
        mean(&repeated)
    }
}

/// Signed semitone steps between consecutive pitches, in sequence order.
pub fn interval_series(pitches: &[u8]) -> Vec<i16> {
    pitches
        .windows(2)
        .map(|w| w[1] as i16 - w[0] as i16)
        .collect()
}

const INTERVAL_NAMES: [&str; 12] = [
    "P1", "m2", "M2", "m3", "M3", "P4", "TT", "P5", "m6", "M6", "m7", "M7",
];

/// Conventional name of an interval magnitude; compounds carry octaves, e.g. `P8+M2`.
pub fn interval_name(semitones: u16) -> String {
    let octaves = semitones / 12;
    let simple = INTERVAL_NAMES[(semitones % 12) as usize];
    match (octaves, semitones % 12) {
        (0, _) => simple.to_string(),
        (1, 0) => "P8".to_string(),
        (n, 0) => format!("{n}xP8"),
        (1, _) => format!("P8+{simple}"),
        (n, _) => format!("{n}xP8+{simple}"),
    }
}

/// Occurrences of one interval magnitude, split by direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntervalCount {
    pub semitones: u16,
    pub name: String,
    pub count: usize,
    pub ascending: usize,
    pub descending: usize,
}

/// Interval frequencies grouped by magnitude.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalTally {
    by_magnitude: BTreeMap<u16, IntervalCount>,
}

impl IntervalTally {
    pub fn from_series(series: &[i16]) -> Self {
        let mut by_magnitude: BTreeMap<u16, IntervalCount> = BTreeMap::new();
        for &step in series {
            let magnitude = step.unsigned_abs();
            let entry = by_magnitude.entry(magnitude).or_insert_with(|| IntervalCount {
                semitones: magnitude,
                name: interval_name(magnitude),
                ..Default::default()
            });
            entry.count += 1;
            if step > 0 {
                entry.ascending += 1;
            } else if step < 0 {
                entry.descending += 1;
            }
        }
        Self { by_magnitude }
    }

    /// Most frequent first; ties broken by smaller magnitude.
    pub fn ranked(&self) -> Vec<IntervalCount> {
        let mut ranked: Vec<IntervalCount> = self.by_magnitude.values().cloned().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.semitones.cmp(&b.semitones)));
        ranked
    }

    pub fn is_empty(&self) -> bool {
        self.by_magnitude.is_empty()
    }
}

/// Onset quantization for co-occurrence: hundredths of a beat.
fn quantize_onset(onset: f64) -> i64 {
    (onset * 100.0).round() as i64
}

/// Weighted co-occurrence graph over part names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionGraph {
    pub nodes: Vec<String>,
    /// Keyed by the sorted name pair
    pub edges: BTreeMap<(String, String), usize>,
}

/// Build the interaction graph from `(part name, onsets)` pairs.
///
/// Parts sharing a name collapse into one node.
pub fn interaction_graph<'a, I>(parts: I) -> InteractionGraph
where
    I: IntoIterator<Item = (&'a str, Vec<f64>)>,
{
    let mut nodes: Vec<String> = Vec::new();
    let mut instants: BTreeMap<i64, BTreeSet<&'a str>> = BTreeMap::new();

    for (name, onsets) in parts {
        if !nodes.iter().any(|n| n == name) {
            nodes.push(name.to_string());
        }
        for onset in onsets {
            instants.entry(quantize_onset(onset)).or_default().insert(name);
        }
    }

    let mut edges: BTreeMap<(String, String), usize> = BTreeMap::new();
    for sounding in instants.values() {
        let names: Vec<&str> = sounding.iter().copied().collect();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                *edges.entry((a.to_string(), b.to_string())).or_default() += 1;
            }
        }
    }

    InteractionGraph { nodes, edges }
}

impl InteractionGraph {
    /// Entropy of the edge-weight distribution.
    pub fn entropy(&self) -> f64 {
        let weights: Vec<usize> = self.edges.values().copied().collect();
        entropy(&weights)
    }

    /// Edge weights keyed `"A-B"`.
    pub fn named_edges(&self) -> BTreeMap<String, usize> {
        self.edges
            .iter()
            .map(|((a, b), &w)| (format!("{a}-{b}"), w))
            .collect()
    }
}

pub const FRACTAL_SCALES: [usize; 4] = [1, 2, 4, 8];

/// Multi-scale onset variance signature, rounded to 3 decimals.
///
/// For each scale, the std-dev of consecutive window means; then the std-dev
/// of those values. Fewer than two onsets give 0.0.
pub fn fractal_signature(onsets: &[f64]) -> f64 {
    if onsets.len() < 2 {
        return 0.0;
    }
    let per_scale: Vec<f64> = FRACTAL_SCALES
        .iter()
        .map(|&scale| {
            let means: Vec<f64> = onsets.chunks(scale).map(mean).collect();
            std_dev(&means)
        })
        .collect();
    round_to(std_dev(&per_scale), 3)
}

/// One value attached to a measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureValue<V> {
    pub measure: usize,
    pub value: V,
}

/// Ordered per-measure values plus how their boundaries were obtained.
///
/// Symbolic series serialize as a plain array; proportional ones as
/// `{"alignment": "proportional", "measures": [...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<V> {
    pub alignment: Alignment,
    pub values: Vec<MeasureValue<V>>,
}

impl<V> Series<V> {
    pub fn map<W>(self, mut f: impl FnMut(V) -> W) -> Series<W> {
        Series {
            alignment: self.alignment,
            values: self
                .values
                .into_iter()
                .map(|mv| MeasureValue {
                    measure: mv.measure,
                    value: f(mv.value),
                })
                .collect(),
        }
    }

    /// Pair two series over the same grid value by value.
    pub fn zip_with<U, W>(self, other: Series<U>, mut f: impl FnMut(V, U) -> W) -> Series<W> {
        Series {
            alignment: self.alignment,
            values: self
                .values
                .into_iter()
                .zip(other.values)
                .map(|(a, b)| MeasureValue {
                    measure: a.measure,
                    value: f(a.value, b.value),
                })
                .collect(),
        }
    }

    pub fn raw(&self) -> impl Iterator<Item = &V> {
        self.values.iter().map(|mv| &mv.value)
    }
}

impl<V: Serialize> Serialize for Series<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.alignment {
            Alignment::Symbolic => self.values.serialize(serializer),
            Alignment::Proportional => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("alignment", &self.alignment)?;
                map.serialize_entry("measures", &self.values)?;
                map.end()
            }
        }
    }
}

/// Apply `stat` to every bucket, in measure order.
pub fn windowed_stat<T, V>(buckets: &Buckets<T>, stat: impl Fn(&[T]) -> V) -> Series<V> {
    Series {
        alignment: buckets.alignment(),
        values: buckets
            .iter()
            .map(|b| MeasureValue {
                measure: b.measure,
                value: stat(&b.items),
            })
            .collect(),
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Pearson correlation; 0.0 when lengths differ, fewer than two points, or
/// either side is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(a), mean(b));
    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        covariance += (x - ma) * (y - mb);
        var_a += (x - ma) * (x - ma);
        var_b += (y - mb) * (y - mb);
    }
    let denominator = (var_a * var_b).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    covariance / denominator
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    // Avoid -0.0 in output
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple of all values; `None` when empty or any value is zero.
pub fn lcm(values: &[u64]) -> Option<u64> {
    if values.is_empty() || values.contains(&0) {
        return None;
    }
    values
        .iter()
        .try_fold(1u64, |acc, &v| (acc / gcd(acc, v)).checked_mul(v))
}

/// Occurrence counts of arbitrary keys, first-seen order irrelevant.
pub fn frequencies<K: std::hash::Hash + Eq + Ord + Clone>(items: &[K]) -> BTreeMap<K, usize> {
    let mut counts: HashMap<&K, usize> = HashMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    counts.into_iter().map(|(k, v)| (k.clone(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn histogram_matches_numpy_edges() {
        let h = Histogram::fixed_bins(&[60.0, 62.0, 64.0, 67.0, 69.0, 71.0], 12);
        assert_eq!(h.counts, vec![1, 0, 1, 0, 1, 0, 0, 1, 0, 1, 0, 1]);
        assert_eq!(h.populated(), 6);

        let degenerate = Histogram::fixed_bins(&[5.0, 5.0], 8);
        assert_eq!(degenerate.low, 4.5);
        assert_eq!(degenerate.counts.iter().sum::<usize>(), 2);
    }

    #[test]
    fn entropy_boundaries() {
        assert_eq!(entropy(&[]), 0.0);
        assert_eq!(entropy(&[0, 0]), 0.0);
        assert_eq!(entropy(&[7]), 0.0);
        assert_eq!(entropy(&[1, 1]), 1.0);
        assert_eq!(entropy_smoothed(&[0, 9, 0]), 0.0);
        assert_eq!(binned_entropy(&[], 12), 0.0);
        assert_eq!(binned_entropy(&[64.0; 5], 12), 0.0);
    }

    #[test]
    fn six_equal_pitches_give_log2_six() {
        let e = binned_entropy(&[60.0, 62.0, 64.0, 67.0, 69.0, 71.0], 12);
        assert_eq!(e, 2.585);
    }

    #[test]
    fn entropy_is_never_negative() {
        for counts in [vec![1, 0, 0, 1000], vec![3, 3, 3], vec![0, 1]] {
            assert!(entropy(&counts) >= 0.0);
            assert!(entropy_smoothed(&counts) >= 0.0);
        }
    }

    #[test]
    fn motif_window_counts() {
        let pitches = [60, 62, 64, 60, 62, 64, 60];
        let motifs = motif_counts(&pitches, 3);
        assert_eq!(motifs.window_count(), 5);
        assert_eq!(motifs.count(&[60, 62, 64]), 2);
        assert_eq!(motifs.count(&[62, 64, 60]), 2);
        assert_eq!(motifs.count(&[64, 60, 62]), 1);

        let recurrent = motifs.recurrent();
        assert_eq!(recurrent.get("60-62-64"), Some(&2));
        assert_eq!(recurrent.len(), 2);
        assert_eq!(motifs.mean_recurrence(), 2.0);

        assert_eq!(motif_counts(&[60, 62], 3).window_count(), 0);
        assert_eq!(motif_counts(&pitches, 0).window_count(), 0);
    }

    #[test]
    fn intervals_keep_direction() {
        let series = interval_series(&[60, 62, 60, 67, 67]);
        assert_eq!(series, vec![2, -2, 7, 0]);

        let ranked = IntervalTally::from_series(&series).ranked();
        assert_eq!(ranked[0].semitones, 2);
        assert_eq!(ranked[0].name, "M2");
        assert_eq!((ranked[0].ascending, ranked[0].descending), (1, 1));
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn interval_names() {
        assert_eq!(interval_name(0), "P1");
        assert_eq!(interval_name(7), "P5");
        assert_eq!(interval_name(12), "P8");
        assert_eq!(interval_name(14), "P8+M2");
        assert_eq!(interval_name(24), "2xP8");
    }

    #[test]
    fn interaction_graph_counts_shared_instants() {
        let graph = interaction_graph(vec![
            ("Piano", vec![0.0, 1.0, 2.0]),
            ("Violin", vec![0.001, 1.0, 3.0]),
            ("Cello", vec![1.0]),
        ]);
        let edges = graph.named_edges();
        assert_eq!(edges.get("Piano-Violin"), Some(&2));
        assert_eq!(edges.get("Cello-Piano"), Some(&1));
        assert_eq!(edges.get("Cello-Violin"), Some(&1));
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.entropy() > 0.0);

        let lonely = interaction_graph(vec![("Piano", vec![0.0, 1.0])]);
        assert!(lonely.edges.is_empty());
        assert_eq!(lonely.entropy(), 0.0);
    }

    #[test]
    fn fractal_signature_needs_two_onsets() {
        assert_eq!(fractal_signature(&[]), 0.0);
        assert_eq!(fractal_signature(&[3.0]), 0.0);
        let evenly: Vec<f64> = (0..16).map(|i| i as f64).collect();
        assert!(fractal_signature(&evenly) > 0.0);
        assert_eq!(fractal_signature(&evenly), fractal_signature(&evenly));
    }

    #[test]
    fn descriptive_statistics() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_variance(&[1.0, 2.0, 3.0, 4.0]), 1.25);
        assert_eq!(std_dev(&[2.0, 2.0]), 0.0);
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), 0.0);
        assert_eq!(round_to(-0.0001, 3), 0.0);
        assert_eq!(lcm(&[2, 3, 4]), Some(12));
        assert_eq!(lcm(&[]), None);
    }

    #[test]
    fn proportional_series_serializes_with_alignment() {
        let series = Series {
            alignment: Alignment::Proportional,
            values: vec![MeasureValue { measure: 1, value: 3 }],
        };
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["alignment"], "proportional");
        assert_eq!(json["measures"][0]["value"], 3);

        let symbolic = Series {
            alignment: Alignment::Symbolic,
            values: vec![MeasureValue { measure: 1, value: 3 }],
        };
        assert!(serde_json::to_value(&symbolic).unwrap().is_array());
    }
}
