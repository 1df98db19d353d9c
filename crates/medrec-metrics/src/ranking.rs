//! Top-k ranking metrics: Hit-Ratio@k and NDCG@k.
//!
//! Ordering is by descending score with ties broken by ascending index, so
//! the top-k of a score vector is fully determined. NaN scores rank last.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::mean;

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// All indices ordered by descending score, ties by ascending index.
pub fn descending_order(scores: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // sort_by is stable, so equal scores keep index order
    order.sort_by(|&a, &b| {
        rank_key(scores[b])
            .partial_cmp(&rank_key(scores[a]))
            .unwrap_or(Ordering::Equal)
    });
    order
}

/// The `k` highest-scoring indices, best first.
pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order = descending_order(scores);
    order.truncate(k);
    order
}

/// 1.0 if any of the top-k is a true drug.
pub fn hit_at_k(truth: &[bool], scores: &[f32], k: usize) -> f64 {
    let hit = top_k_indices(scores, k).into_iter().any(|i| truth[i]);
    if hit { 1.0 } else { 0.0 }
}

/// Normalised discounted cumulative gain over the top-k.
///
/// The ideal DCG sums `min(|truth|, k)` terms; an empty truth set scores 0.
pub fn ndcg_at_k(truth: &[bool], scores: &[f32], k: usize) -> f64 {
    let positives = truth.iter().filter(|&&t| t).count();
    if positives == 0 {
        return 0.0;
    }
    let dcg: f64 = top_k_indices(scores, k)
        .into_iter()
        .enumerate()
        .filter(|&(_, i)| truth[i])
        .map(|(rank, _)| discount(rank))
        .sum();
    let idcg: f64 = (0..positives.min(k)).map(discount).sum();
    dcg / idcg
}

fn discount(rank: usize) -> f64 {
    1.0 / ((rank + 2) as f64).log2()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingScores {
    pub hit_ratio: f64,
    pub ndcg: f64,
}

/// Mean Hit-Ratio@k and NDCG@k over a list of (truth, scores) pairs.
pub fn hit_ratio_and_ndcg(truth: &[Vec<bool>], scores: &[Vec<f32>], k: usize) -> RankingScores {
    let mut hits = Vec::with_capacity(truth.len());
    let mut ndcg = Vec::with_capacity(truth.len());
    for (t, s) in truth.iter().zip(scores) {
        hits.push(hit_at_k(t, s, k));
        ndcg.push(ndcg_at_k(t, s, k));
    }
    RankingScores {
        hit_ratio: mean(&hits),
        ndcg: mean(&ndcg),
    }
}
