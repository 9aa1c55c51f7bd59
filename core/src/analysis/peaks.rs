use std::cmp::Ordering;

use find_peaks::PeakFinder;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extremum {
    Peak,
    Valley,
}

/// Ordered indices of accepted extrema of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakSet {
    pub kind: Extremum,
    indices: Vec<usize>,
}

impl PeakSet {
    pub fn new(kind: Extremum, mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        PeakSet { kind, indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Signal values at the accepted indices.
    pub fn values_in(&self, signal: ArrayView1<f64>) -> Vec<f64> {
        self.indices.iter().filter_map(|&i| signal.get(i).copied()).collect()
    }

    /// Index distance between consecutive extrema.
    pub fn intervals(&self) -> Vec<usize> {
        self.indices.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    index: usize,
    prominence: f64,
}

/// Finds local maxima (or minima) subject to a minimum spacing and a
/// minimum prominence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakDetector {
    pub min_separation: usize,
    pub min_prominence: f64,
}

impl PeakDetector {
    pub fn new(min_separation: usize, min_prominence: f64) -> Self {
        PeakDetector {
            min_separation,
            min_prominence,
        }
    }

    pub fn find(&self, signal: ArrayView1<f64>, kind: Extremum) -> PeakSet {
        let oriented: Vec<f64> = match kind {
            Extremum::Peak => signal.to_vec(),
            Extremum::Valley => signal.iter().map(|x| -x).collect(),
        };

        let candidates = candidates(&oriented, self.min_prominence);
        PeakSet::new(kind, self.select_by_separation(candidates))
    }

    /// Keeps the most prominent candidates first, discarding any that fall
    /// within `min_separation` of an already kept one. Ties go to the earlier index.
    fn select_by_separation(&self, candidates: Vec<Candidate>) -> Vec<usize> {
        if self.min_separation <= 1 {
            return candidates.into_iter().map(|c| c.index).collect();
        }

        let mut by_priority = candidates;
        by_priority.sort_by(|a, b| match b.prominence.total_cmp(&a.prominence) {
            Ordering::Equal => a.index.cmp(&b.index),
            other => other,
        });

        let mut kept: Vec<usize> = Vec::with_capacity(by_priority.len());
        for candidate in by_priority {
            let clashes = kept
                .iter()
                .any(|&k| k.abs_diff(candidate.index) < self.min_separation);
            if !clashes {
                kept.push(candidate.index);
            }
        }
        kept
    }
}

pub fn find_extrema(signal: ArrayView1<f64>, min_separation: usize, min_prominence: f64, kind: Extremum) -> PeakSet {
    PeakDetector::new(min_separation, min_prominence).find(signal, kind)
}

/// Local maxima of `data` with their prominence, at least `min_prominence`.
/// A flat top counts once, at its lower midpoint; maxima touching either end
/// of the sequence are not reported.
fn candidates(data: &[f64], min_prominence: f64) -> Vec<Candidate> {
    if data.len() < 3 {
        return Vec::new();
    }

    let mut found: Vec<Candidate> = PeakFinder::new(data)
        .with_min_prominence(min_prominence)
        .find_peaks()
        .iter()
        .filter(|p| p.position.start > 0 && p.position.end < data.len())
        .filter_map(|p| {
            Some(Candidate {
                index: (p.position.start + p.position.end - 1) / 2,
                prominence: p.prominence?,
            })
        })
        .collect();
    found.sort_unstable_by_key(|c| c.index);
    found
}
