//! Seeded k-means for formal section labelling.
//!
//! Must be bit-identical across runs and platforms, so the generator is a
//! plain SplitMix64 stream and ties always resolve to the lowest index.

/// Seed used for every clustering in the engine.
pub const SECTION_SEED: u64 = 42;

const MAX_ITERATIONS: usize = 100;

/// SplitMix64 (Steele, Lea & Flood 2014).
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, bound)`; `bound` must be non-zero.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Cluster `points` into at most `k` groups with Lloyd's algorithm.
///
/// Initial centroids are `k` distinct points drawn by a seeded shuffle; with
/// fewer distinct points than `k`, that many clusters are used. Labels are
/// renumbered in order of first appearance so the first point is always 0.
pub fn kmeans(points: &[Vec<f64>], k: usize, seed: u64) -> Vec<usize> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut distinct: Vec<&Vec<f64>> = Vec::new();
    for p in points {
        if !distinct.iter().any(|d| *d == p) {
            distinct.push(p);
        }
    }

    // Fisher-Yates over the distinct points
    let mut rng = SplitMix64::new(seed);
    for i in (1..distinct.len()).rev() {
        let j = rng.below(i + 1);
        distinct.swap(i, j);
    }

    let k = k.min(distinct.len());
    let mut centroids: Vec<Vec<f64>> = distinct[..k].iter().map(|p| (*p).clone()).collect();
    let mut labels: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();

    for _ in 0..MAX_ITERATIONS {
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == c)
                .map(|(p, _)| p)
                .collect();
            // An emptied cluster keeps its previous centroid
            if members.is_empty() {
                continue;
            }
            for (dim, value) in centroid.iter_mut().enumerate() {
                *value = members.iter().map(|m| m[dim]).sum::<f64>() / members.len() as f64;
            }
        }

        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == labels {
            break;
        }
        labels = next;
    }

    relabel_by_appearance(&labels)
}

fn relabel_by_appearance(labels: &[usize]) -> Vec<usize> {
    let mut order: Vec<usize> = Vec::new();
    labels
        .iter()
        .map(|l| match order.iter().position(|o| o == l) {
            Some(i) => i,
            None => {
                order.push(*l);
                order.len() - 1
            }
        })
        .collect()
}
