//! Drug-drug interaction rate of predicted medication sets.

use medrec_common::AdjacencyMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Co-prescribed pair counts behind a DDI rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    pub interacting: usize,
    pub total: usize,
}

impl PairCounts {
    /// interacting / total, 0 when no visit had two or more drugs.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.interacting as f64 / self.total as f64
    }
}

/// Scores predicted medication lists against a fixed DDI adjacency.
#[derive(Debug, Clone)]
pub struct DdiScorer {
    adjacency: AdjacencyMatrix,
}

impl DdiScorer {
    pub fn new(adjacency: AdjacencyMatrix) -> Self {
        let n = adjacency.size();
        let flagged = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| adjacency.interacts(i, j))
            .count();
        debug!("DDI scorer over {} drugs with {} interacting pairs", n, flagged);
        Self { adjacency }
    }

    pub fn adjacency(&self) -> &AdjacencyMatrix {
        &self.adjacency
    }

    /// Count pairs over a per-patient, per-visit structure of label lists.
    pub fn pair_counts(&self, record: &[Vec<Vec<usize>>]) -> PairCounts {
        let mut counts = PairCounts::default();
        for patient in record {
            for meds in patient {
                for (i, &a) in meds.iter().enumerate() {
                    for &b in &meds[i + 1..] {
                        counts.total += 1;
                        if self.adjacency.interacts(a, b) {
                            counts.interacting += 1;
                        }
                    }
                }
            }
        }
        counts
    }

    /// Fraction of co-prescribed pairs flagged as interacting.
    pub fn rate(&self, record: &[Vec<Vec<usize>>]) -> f64 {
        self.pair_counts(record).rate()
    }

    /// Rate of a single visit's prediction, scored as a one-visit cohort.
    pub fn visit_rate(&self, labels: &[usize]) -> f64 {
        self.rate(&[vec![labels.to_vec()]])
    }
}
