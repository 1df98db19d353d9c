//! Set-overlap metrics between predicted and true medication sets.

use serde::{Deserialize, Serialize};

use crate::prauc::average_precision;
use crate::mean;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
struct Overlap {
    intersection: usize,
    truth: usize,
    predicted: usize,
}

fn overlap(truth: &[bool], predicted: &[bool]) -> Overlap {
    debug_assert_eq!(truth.len(), predicted.len());
    let mut o = Overlap::default();
    for (&t, &p) in truth.iter().zip(predicted) {
        o.truth += t as usize;
        o.predicted += p as usize;
        o.intersection += (t && p) as usize;
    }
    o
}

/// |A ∩ B| / |A ∪ B|; 0 when both sets are empty.
pub fn jaccard(truth: &[bool], predicted: &[bool]) -> f64 {
    let o = overlap(truth, predicted);
    let union = o.truth + o.predicted - o.intersection;
    if union == 0 {
        return 0.0;
    }
    o.intersection as f64 / union as f64
}

/// Fraction of predicted drugs that are correct; 0 for an empty prediction.
pub fn precision(truth: &[bool], predicted: &[bool]) -> f64 {
    let o = overlap(truth, predicted);
    if o.predicted == 0 {
        return 0.0;
    }
    o.intersection as f64 / o.predicted as f64
}

/// Fraction of true drugs that were predicted; 0 for an empty truth set.
pub fn recall(truth: &[bool], predicted: &[bool]) -> f64 {
    let o = overlap(truth, predicted);
    if o.truth == 0 {
        return 0.0;
    }
    o.intersection as f64 / o.truth as f64
}

/// Harmonic mean of precision and recall; 0 when both are 0.
pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// Visit-averaged set metrics for one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiLabelScores {
    pub jaccard: f64,
    pub prauc: f64,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub avg_f1: f64,
}

/// Pool a patient's visits: each metric is computed per visit, then averaged.
///
/// F1 is averaged over visits rather than derived from the averaged
/// precision and recall.
pub fn multi_label_metric(
    truth: &[Vec<bool>],
    predicted: &[Vec<bool>],
    probabilities: &[Vec<f32>],
) -> MultiLabelScores {
    let n = truth.len();
    let mut ja = Vec::with_capacity(n);
    let mut pr = Vec::with_capacity(n);
    let mut p = Vec::with_capacity(n);
    let mut r = Vec::with_capacity(n);
    let mut f = Vec::with_capacity(n);

    for ((t, y), prob) in truth.iter().zip(predicted).zip(probabilities) {
        let visit_p = precision(t, y);
        let visit_r = recall(t, y);
        ja.push(jaccard(t, y));
        pr.push(average_precision(t, prob));
        p.push(visit_p);
        r.push(visit_r);
        f.push(f1(visit_p, visit_r));
    }

    MultiLabelScores {
        jaccard: mean(&ja),
        prauc: mean(&pr),
        avg_precision: mean(&p),
        avg_recall: mean(&r),
        avg_f1: mean(&f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrec_test_utils::labels;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_jaccard_identity_and_empty() {
        let a = labels(6, &[1, 3, 4]);
        assert_eq!(jaccard(&a, &a), 1.0);
        let empty = labels(6, &[]);
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        let truth = labels(5, &[0, 1, 2]);
        let pred = labels(5, &[1, 2, 3]);
        // |{1,2}| / |{0,1,2,3}|
        assert!((jaccard(&truth, &pred) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard_bounded_for_random_sets() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let a: Vec<bool> = (0..12).map(|_| rng.gen_bool(0.3)).collect();
            let b: Vec<bool> = (0..12).map(|_| rng.gen_bool(0.3)).collect();
            let j = jaccard(&a, &b);
            assert!((0.0..=1.0).contains(&j), "jaccard out of range: {}", j);
        }
    }

    #[test]
    fn test_empty_prediction_scores_zero() {
        let truth = labels(4, &[0, 2]);
        let pred = labels(4, &[]);
        assert_eq!(precision(&truth, &pred), 0.0);
        assert_eq!(recall(&truth, &pred), 0.0);
        assert_eq!(f1(0.0, 0.0), 0.0);
        assert_eq!(jaccard(&truth, &pred), 0.0);
    }

    #[test]
    fn test_precision_recall_f1() {
        let truth = labels(6, &[0, 1, 2, 3]);
        let pred = labels(6, &[0, 1, 5]);
        let p = precision(&truth, &pred);
        let r = recall(&truth, &pred);
        assert!((p - 2.0 / 3.0).abs() < 1e-12);
        assert!((r - 0.5).abs() < 1e-12);
        assert!((f1(p, r) - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_multi_label_metric_averages_visits() {
        let truth = vec![labels(3, &[0]), labels(3, &[1, 2])];
        let pred = vec![labels(3, &[0]), labels(3, &[])];
        let probs = vec![vec![0.9, 0.1, 0.1], vec![0.2, 0.4, 0.3]];
        let scores = multi_label_metric(&truth, &pred, &probs);
        assert!((scores.jaccard - 0.5).abs() < 1e-12);
        assert!((scores.avg_precision - 0.5).abs() < 1e-12);
        assert!((scores.avg_recall - 0.5).abs() < 1e-12);
        assert!((scores.avg_f1 - 0.5).abs() < 1e-12);
        // Both visits rank their true drugs first
        assert!((scores.prauc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_multi_label_metric_empty_patient() {
        assert_eq!(multi_label_metric(&[], &[], &[]), MultiLabelScores::default());
    }
}
