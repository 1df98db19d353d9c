//! Bootstrap evaluation of a trained model on the test split.

use medrec_common::Patient;
use medrec_metrics::{mean, std_dev, DdiScorer};
use medrec_model::SequentialPredictor;
use rand::Rng;
use tracing::debug;

use crate::evaluate::evaluate;
use crate::Result;

pub const BOOTSTRAP_COLUMNS: [&str; 15] = [
    "ddi", "ja", "f1", "prauc", "med", "HR@1", "HR@2", "HR@3", "HR@4", "HR@5", "NDCG@1", "NDCG@2",
    "NDCG@3", "NDCG@4", "NDCG@5",
];

#[derive(Debug, Clone)]
pub struct BootstrapSummary {
    /// One row per round, columns as in [`BOOTSTRAP_COLUMNS`]
    pub rounds: Vec<[f64; 15]>,
    pub mean: [f64; 15],
    /// Population standard deviation across rounds
    pub std: [f64; 15],
}

impl BootstrapSummary {
    fn from_rounds(rounds: Vec<[f64; 15]>) -> Self {
        let column = |c: usize| rounds.iter().map(|row| row[c]).collect::<Vec<_>>();
        let mean = std::array::from_fn(|c| mean(&column(c)));
        let std = std::array::from_fn(|c| std_dev(&column(c)));
        Self { rounds, mean, std }
    }

    /// `mean ± std` per column, `&`-separated.
    pub fn render(&self) -> String {
        self.mean
            .iter()
            .zip(&self.std)
            .map(|(m, s)| format!("{m:.4} ± {s:.4}"))
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// Evaluate `rounds` resamples of `round(fraction·|test|)` patients drawn
/// with replacement.
pub fn bootstrap_evaluate<P, R>(
    model: &P,
    test: &[Patient],
    scorer: &DdiScorer,
    rounds: usize,
    fraction: f64,
    rng: &mut R,
) -> Result<BootstrapSummary>
where
    P: SequentialPredictor + ?Sized,
    R: Rng + ?Sized,
{
    let sample_size = if test.is_empty() { 0 } else { (test.len() as f64 * fraction).round() as usize };
    let mut rows = Vec::with_capacity(rounds);
    for round in 0..rounds {
        let sample: Vec<Patient> = (0..sample_size)
            .map(|_| test[rng.gen_range(0..test.len())].clone())
            .collect();
        let report = evaluate(model, &sample, scorer)?;
        debug!("Bootstrap round {}: {}", round + 1, report.summary_line());
        rows.push(report.bootstrap_row());
    }
    Ok(BootstrapSummary::from_rounds(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;
    use medrec_model::{GameNet, ModelConfig};
    use medrec_test_utils::{co_occurrence, random_patients, single_pair_ddi, tiny_vocab};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_summary_statistics() {
        let mut a = [0.0; 15];
        let mut b = [0.0; 15];
        a[1] = 0.2;
        b[1] = 0.4;
        let summary = BootstrapSummary::from_rounds(vec![a, b]);
        assert!((summary.mean[1] - 0.3).abs() < 1e-12);
        assert!((summary.std[1] - 0.1).abs() < 1e-12);
        assert_eq!(summary.mean[0], 0.0);
        assert!(summary.render().starts_with("0.0000 ± 0.0000 & 0.3000 ± 0.1000"));
    }

    #[test]
    fn test_no_rounds() {
        let summary = BootstrapSummary::from_rounds(Vec::new());
        assert_eq!(summary.mean, [0.0; 15]);
        assert_eq!(summary.render().matches('&').count(), 14);
    }

    #[test]
    fn test_same_seed_same_resamples() {
        let vocab = tiny_vocab();
        let cohort = random_patients(3, 6, 3, vocab);
        let ehr = co_occurrence(&cohort, vocab.num_med);
        let ddi = single_pair_ddi(vocab.num_med);
        let varmap = VarMap::new();
        let config = ModelConfig::default().with_emb_dim(8);
        let model = GameNet::from_varmap(&varmap, config, vocab, &ehr, &ddi, &Device::Cpu).unwrap();
        let scorer = DdiScorer::new(ddi);

        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            bootstrap_evaluate(&model, &cohort, &scorer, 4, 0.8, &mut rng).unwrap()
        };
        let first = run(17);
        let second = run(17);
        assert_eq!(first.rounds.len(), 4);
        assert_eq!(first.rounds, second.rounds);
        assert_eq!(first.mean, second.mean);
        assert_eq!(first.std, second.std);
    }
}
