//! Area under the precision-recall curve for a single visit.

use crate::ranking::descending_order;

/// Average precision of a probability ranking against binary truth.
///
/// Step-wise sum `Σ (Rₙ − Rₙ₋₁)·Pₙ` taken at each distinct score
/// threshold, so tied scores enter the curve together. 0 when the truth
/// set is empty.
pub fn average_precision(truth: &[bool], scores: &[f32]) -> f64 {
    let positives = truth.iter().filter(|&&t| t).count();
    if positives == 0 {
        return 0.0;
    }

    let order = descending_order(scores);
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;

    for (pos, &idx) in order.iter().enumerate() {
        if truth[idx] {
            tp += 1;
        } else {
            fp += 1;
        }
        let threshold_ends = order
            .get(pos + 1)
            .map(|&next| scores[next] != scores[idx])
            .unwrap_or(true);
        if threshold_ends {
            let recall = tp as f64 / positives as f64;
            let precision = tp as f64 / (tp + fp) as f64;
            ap += (recall - prev_recall) * precision;
            prev_recall = recall;
        }
    }
    ap
}
