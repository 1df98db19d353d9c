//! medrec-metrics — Evaluation metrics for medication recommendation.
//!
//! Every metric here is a pure function of one prediction versus its ground
//! truth. Degenerate inputs (empty truth, empty prediction, empty cohort)
//! score 0 instead of producing NaN.

pub mod set_metrics;
pub mod prauc;
pub mod ranking;
pub mod ddi;

pub use ddi::{DdiScorer, PairCounts};
pub use prauc::average_precision;
pub use ranking::{hit_ratio_and_ndcg, top_k_indices, RankingScores};
pub use set_metrics::{multi_label_metric, MultiLabelScores};

/// Mean of a slice; 0 when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 when empty.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Indices of the set entries of a binary label vector.
pub fn label_indices(labels: &[bool]) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter_map(|(i, &set)| set.then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_of_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn test_population_std() {
        // Population std of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        assert!((std_dev(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_label_indices() {
        assert_eq!(label_indices(&[false, true, false, true]), vec![1, 3]);
        assert!(label_indices(&[false, false]).is_empty());
    }
}
