//! Per-visit evaluation over a cohort.

use medrec_common::Patient;
use medrec_metrics::{hit_ratio_and_ndcg, label_indices, mean, multi_label_metric, DdiScorer};
use medrec_model::SequentialPredictor;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::progress::step_bar;
use crate::Result;

/// Ranking cutoffs reported: HR@1..=5 and NDCG@1..=5.
pub const MAX_RANK_CUTOFF: usize = 5;

/// Probability at or above which a drug is predicted.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Cohort-level evaluation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub ddi_rate: f64,
    pub jaccard: f64,
    pub prauc: f64,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub avg_f1: f64,
    /// Mean number of predicted drugs per visit
    pub avg_med: f64,
    /// `hit_ratio[k - 1]` is HR@k
    pub hit_ratio: [f64; MAX_RANK_CUTOFF],
    /// `ndcg[k - 1]` is NDCG@k
    pub ndcg: [f64; MAX_RANK_CUTOFF],
}

impl EvalReport {
    /// Every metric under its history key.
    pub fn named_values(&self) -> Vec<(String, f64)> {
        let mut values = vec![
            ("ja".to_string(), self.jaccard),
            ("ddi_rate".to_string(), self.ddi_rate),
            ("avg_p".to_string(), self.avg_precision),
            ("avg_r".to_string(), self.avg_recall),
            ("avg_f1".to_string(), self.avg_f1),
            ("prauc".to_string(), self.prauc),
            ("med".to_string(), self.avg_med),
        ];
        for k in 1..=MAX_RANK_CUTOFF {
            values.push((format!("hit_ratio_{k}"), self.hit_ratio[k - 1]));
        }
        for k in 1..=MAX_RANK_CUTOFF {
            values.push((format!("ndcg_{k}"), self.ndcg[k - 1]));
        }
        values
    }

    /// Bootstrap column order: ddi, ja, f1, prauc, med, HR@1..5, NDCG@1..5.
    pub fn bootstrap_row(&self) -> [f64; 15] {
        let mut row = [0.0; 15];
        row[..5].copy_from_slice(&[self.ddi_rate, self.jaccard, self.avg_f1, self.prauc, self.avg_med]);
        row[5..10].copy_from_slice(&self.hit_ratio);
        row[10..].copy_from_slice(&self.ndcg);
        row
    }

    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "DDI Rate: {:.4}, Jaccard: {:.4}, PRAUC: {:.4}, AVG_PRC: {:.4}, AVG_RECALL: {:.4}, AVG_F1: {:.4}, AVG_MED: {:.4}",
            self.ddi_rate, self.jaccard, self.prauc, self.avg_precision, self.avg_recall, self.avg_f1, self.avg_med
        );
        for (k, v) in self.hit_ratio.iter().enumerate() {
            line.push_str(&format!(", HR@{}: {:.4}", k + 1, v));
        }
        for (k, v) in self.ndcg.iter().enumerate() {
            line.push_str(&format!(", NDCG@{}: {:.4}", k + 1, v));
        }
        line
    }
}

/// Per-patient accumulators, averaged once the cohort is done.
#[derive(Default)]
struct CohortScores {
    jaccard: Vec<f64>,
    prauc: Vec<f64>,
    precision: Vec<f64>,
    recall: Vec<f64>,
    f1: Vec<f64>,
    hit_ratio: [Vec<f64>; MAX_RANK_CUTOFF],
    ndcg: [Vec<f64>; MAX_RANK_CUTOFF],
}

/// Score `model` on every visit of every patient, each visit predicted
/// from its own history prefix.
pub fn evaluate<P>(model: &P, patients: &[Patient], scorer: &DdiScorer) -> Result<EvalReport>
where
    P: SequentialPredictor + ?Sized,
{
    let num_med = model.num_medications();
    let mut scores = CohortScores::default();
    let mut record: Vec<Vec<Vec<usize>>> = Vec::with_capacity(patients.len());
    let mut med_count = 0usize;
    let mut visit_count = 0usize;

    let bar = step_bar(patients.len(), "eval");
    for patient in patients {
        let mut truth = Vec::with_capacity(patient.len());
        let mut predicted = Vec::with_capacity(patient.len());
        let mut probabilities = Vec::with_capacity(patient.len());
        let mut patient_labels = Vec::with_capacity(patient.len());

        for (k, visit) in patient.visits.iter().enumerate() {
            let probs = model.probabilities(patient.prefix(k))?;
            let mut gt = vec![false; num_med];
            for &med in &visit.medications {
                gt[med] = true;
            }
            let pred: Vec<bool> = probs.iter().map(|&p| p >= DECISION_THRESHOLD).collect();
            let labels = label_indices(&pred);

            med_count += labels.len();
            visit_count += 1;
            truth.push(gt);
            predicted.push(pred);
            probabilities.push(probs);
            patient_labels.push(labels);
        }
        record.push(patient_labels);

        let set = multi_label_metric(&truth, &predicted, &probabilities);
        scores.jaccard.push(set.jaccard);
        scores.prauc.push(set.prauc);
        scores.precision.push(set.avg_precision);
        scores.recall.push(set.avg_recall);
        scores.f1.push(set.avg_f1);
        for k in 1..=MAX_RANK_CUTOFF {
            let ranking = hit_ratio_and_ndcg(&truth, &probabilities, k);
            scores.hit_ratio[k - 1].push(ranking.hit_ratio);
            scores.ndcg[k - 1].push(ranking.ndcg);
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let pairs = scorer.pair_counts(&record);
    debug!(
        "Evaluated {} patients / {} visits: {} of {} predicted pairs interact",
        patients.len(),
        visit_count,
        pairs.interacting,
        pairs.total
    );

    Ok(EvalReport {
        ddi_rate: pairs.rate(),
        jaccard: mean(&scores.jaccard),
        prauc: mean(&scores.prauc),
        avg_precision: mean(&scores.precision),
        avg_recall: mean(&scores.recall),
        avg_f1: mean(&scores.f1),
        avg_med: if visit_count == 0 { 0.0 } else { med_count as f64 / visit_count as f64 },
        hit_ratio: std::array::from_fn(|k| mean(&scores.hit_ratio[k])),
        ndcg: std::array::from_fn(|k| mean(&scores.ndcg[k])),
    })
}
