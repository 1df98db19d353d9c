//! Per-visit training with annealed loss selection, and the epoch driver.

use std::time::Instant;

use candle_core::Tensor;
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use medrec_common::{Patient, TrainConfig};
use medrec_metrics::DdiScorer;
use medrec_model::{Mode, SequentialPredictor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::checkpoint::CheckpointStore;
use crate::evaluate::{evaluate, EvalReport, DECISION_THRESHOLD};
use crate::history::MetricHistory;
use crate::loss::{bce_with_logits, blended_loss, multilabel_margin_loss};
use crate::policy::{AnnealedLossSelector, LossBranch};
use crate::progress::step_bar;
use crate::targets::{dense_target, margin_target};
use crate::{Result, TrainError};

/// Mixed into the run seed so gate draws do not replay the model's
/// dropout stream.
const GATE_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed of the loss-selection RNG for a run seeded with `seed`.
pub fn gate_seed(seed: u64) -> u64 {
    seed ^ GATE_STREAM
}

/// Branch counts for one training epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochStats {
    pub blended_steps: usize,
    pub ddi_steps: usize,
}

impl EpochStats {
    pub fn steps(&self) -> usize {
        self.blended_steps + self.ddi_steps
    }
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub best_epoch: usize,
    pub best_jaccard: f64,
    pub epochs: Vec<EpochStats>,
    pub last_report: EvalReport,
}

pub struct Trainer<P> {
    model: P,
    varmap: VarMap,
    optimizer: AdamW,
    scorer: DdiScorer,
    /// `None` when DDI-aware training is off
    selector: Option<AnnealedLossSelector>,
    rng: StdRng,
    history: MetricHistory,
    model_name: String,
}

impl<P: SequentialPredictor> Trainer<P> {
    /// `varmap` must hold the parameters of `model`.
    pub fn new(model: P, varmap: VarMap, scorer: DdiScorer, config: &TrainConfig) -> Result<Self> {
        let params = ParamsAdamW {
            lr: config.lr,
            weight_decay: 0.0,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;
        let selector = config
            .ddi
            .then(|| AnnealedLossSelector::new(config.target_ddi, config.temperature, config.decay_weight));

        Ok(Self {
            model,
            varmap,
            optimizer,
            scorer,
            selector,
            rng: StdRng::seed_from_u64(gate_seed(config.seed)),
            history: MetricHistory::new(),
            model_name: config.model_name.clone(),
        })
    }

    pub fn model(&self) -> &P {
        &self.model
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    pub fn selector(&self) -> Option<&AnnealedLossSelector> {
        self.selector.as_ref()
    }

    /// One optimizer step per visit of every patient, then one temperature
    /// decay.
    pub fn train_epoch(&mut self, patients: &[Patient]) -> Result<EpochStats> {
        let num_med = self.model.num_medications();
        let device = self.model.device().clone();
        let mut stats = EpochStats::default();

        let bar = step_bar(patients.len(), "train");
        for patient in patients {
            for (k, visit) in patient.visits.iter().enumerate() {
                let prediction = self.model.predict(patient.prefix(k), Mode::Train)?;
                let logits = &prediction.logits;

                let dense = Tensor::from_vec(dense_target(&visit.medications, num_med), (1, num_med), &device)?;
                let bce = bce_with_logits(logits, &dense)?;
                let probs = candle_nn::ops::sigmoid(logits)?;
                let margin = multilabel_margin_loss(&probs, &margin_target(&visit.medications, num_med))?;

                let branch = match &self.selector {
                    Some(selector) => {
                        let predicted: Vec<usize> = probs
                            .flatten_all()?
                            .to_vec1::<f32>()?
                            .iter()
                            .enumerate()
                            .filter_map(|(i, &p)| (p >= DECISION_THRESHOLD).then_some(i))
                            .collect();
                        let rate = self.scorer.visit_rate(&predicted);
                        selector.select(rate, &mut self.rng)
                    }
                    None => LossBranch::Blended,
                };

                let loss = match branch {
                    LossBranch::Blended => {
                        stats.blended_steps += 1;
                        blended_loss(&bce, &margin)?
                    }
                    LossBranch::Ddi => {
                        stats.ddi_steps += 1;
                        prediction.ddi_loss.clone().ok_or(TrainError::MissingDdiLoss)?
                    }
                };
                self.optimizer.backward_step(&loss)?;
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        if let Some(selector) = self.selector.as_mut() {
            selector.decay();
            debug!("Temperature decayed to {:.6}", selector.temperature());
        }
        Ok(stats)
    }

    /// Train for `epochs` epochs, evaluating on `eval` and checkpointing
    /// after each. The best epoch is the first epoch after epoch 0 that
    /// strictly improves Jaccard.
    pub fn fit(
        &mut self,
        train: &[Patient],
        eval: &[Patient],
        store: &mut CheckpointStore,
        epochs: usize,
    ) -> Result<FitSummary> {
        let mut best_epoch = 0;
        let mut best_jaccard = 0.0;
        let mut all_stats = Vec::with_capacity(epochs);
        let mut last_report = EvalReport::default();

        for epoch in 0..epochs {
            info!("epoch {} --------------------------", epoch + 1);
            let started = Instant::now();
            let stats = self.train_epoch(train)?;
            info!(
                "Loss selection: {} blended, {} DDI of {} steps",
                stats.blended_steps,
                stats.ddi_steps,
                stats.steps()
            );

            let eval_started = Instant::now();
            let report = evaluate(&self.model, eval, &self.scorer)?;
            info!("{}", report.summary_line());
            info!(
                "training time: {:.2?}, test time: {:.2?}",
                started.elapsed(),
                eval_started.elapsed()
            );

            self.history.record(&report);
            if let Some(line) = self.history.trailing_summary() {
                info!("{}", line);
            }

            store.save(&self.varmap, epoch, &report)?;
            if epoch != 0 && best_jaccard < report.jaccard {
                best_epoch = epoch;
                best_jaccard = report.jaccard;
            }
            info!("best_epoch: {}", best_epoch);

            all_stats.push(stats);
            last_report = report;
        }

        let path = store.save_history(&self.model_name, &self.history)?;
        info!("Wrote metric history to {}", path.display());

        Ok(FitSummary {
            best_epoch,
            best_jaccard,
            epochs: all_stats,
            last_report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use medrec_model::{GameNet, ModelConfig};
    use medrec_common::{AdjacencyMatrix, Visit};
    use medrec_model::{ModelError, Prediction};
    use medrec_test_utils::{tiny_dataset, tiny_patients};
    use rand::Rng;

    fn trainer(config: &TrainConfig) -> Trainer<GameNet> {
        trainer_with_ddi(config, tiny_dataset().ddi_adj)
    }

    /// Tiny-cohort trainer scoring and penalising against `ddi_adj`.
    fn trainer_with_ddi(config: &TrainConfig, ddi_adj: AdjacencyMatrix) -> Trainer<GameNet> {
        let dataset = tiny_dataset();
        let varmap = VarMap::new();
        let model_config = ModelConfig::default()
            .with_emb_dim(config.dim)
            .with_ddi_in_memory(config.ddi)
            .with_seed(config.seed);
        let model = GameNet::from_varmap(
            &varmap,
            model_config,
            dataset.vocab,
            &dataset.ehr_adj,
            &ddi_adj,
            &Device::Cpu,
        )
        .unwrap();
        Trainer::new(model, varmap, DdiScorer::new(ddi_adj), config).unwrap()
    }

    fn config() -> TrainConfig {
        TrainConfig { dim: 8, lr: 1e-3, ..Default::default() }
    }

    #[test]
    fn test_one_step_per_visit_and_temperature_decays() {
        let mut trainer = trainer(&config());
        let stats = trainer.train_epoch(&tiny_patients()).unwrap();
        assert_eq!(stats.steps(), 6);
        let t = trainer.selector().unwrap().temperature();
        assert!((t - 2.0 * 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_target_one_never_takes_ddi_branch() {
        let mut trainer = trainer(&TrainConfig { target_ddi: 1.0, ..config() });
        for _ in 0..2 {
            let stats = trainer.train_epoch(&tiny_patients()).unwrap();
            assert_eq!(stats.ddi_steps, 0);
        }
    }

    #[test]
    fn test_without_ddi_always_blended() {
        let mut trainer = trainer(&TrainConfig { ddi: false, target_ddi: 0.0, ..config() });
        let stats = trainer.train_epoch(&tiny_patients()).unwrap();
        assert_eq!(stats.blended_steps, 6);
        assert!(trainer.selector().is_none());
    }

    #[test]
    fn test_training_updates_parameters() {
        let mut trainer = trainer(&config());
        let prefix = tiny_patients()[0].visits.clone();
        let before = trainer.model().probabilities(&prefix).unwrap();
        trainer.train_epoch(&tiny_patients()).unwrap();
        let after = trainer.model().probabilities(&prefix).unwrap();
        assert_ne!(before, after);
    }

    fn all_interacting(num_med: usize) -> AdjacencyMatrix {
        AdjacencyMatrix::from_rows(vec![vec![1.0; num_med]; num_med]).unwrap()
    }

    /// Gate wide open: any predicted pair is above target and T is huge.
    fn eager_ddi_config() -> TrainConfig {
        TrainConfig { target_ddi: 0.0, temperature: 1e9, ..config() }
    }

    #[test]
    fn test_ddi_branch_backpropagates() {
        let mut trainer = trainer_with_ddi(&eager_ddi_config(), all_interacting(4));
        let prefix = tiny_patients()[0].visits.clone();
        let before = trainer.model().probabilities(&prefix).unwrap();

        let mut ddi_steps = 0;
        for _ in 0..3 {
            ddi_steps += trainer.train_epoch(&tiny_patients()).unwrap().ddi_steps;
        }
        assert!(ddi_steps > 0);
        let after = trainer.model().probabilities(&prefix).unwrap();
        assert_ne!(before, after);
    }

    /// Predicts every drug and never supplies a DDI loss.
    struct NoDdiLoss {
        device: Device,
    }

    impl SequentialPredictor for NoDdiLoss {
        fn num_medications(&self) -> usize {
            4
        }

        fn device(&self) -> &Device {
            &self.device
        }

        fn predict(&self, prefix: &[Visit], _mode: Mode) -> medrec_model::Result<Prediction> {
            if prefix.is_empty() {
                return Err(ModelError::InvalidInput("empty".into()));
            }
            let logits = Tensor::new(&[[5f32, 5.0, 5.0, 5.0]], &self.device)?;
            Ok(Prediction { logits, ddi_loss: None })
        }
    }

    #[test]
    fn test_ddi_branch_without_loss_fails() {
        let model = NoDdiLoss { device: Device::Cpu };
        let scorer = DdiScorer::new(all_interacting(4));
        let mut trainer = Trainer::new(model, VarMap::new(), scorer, &eager_ddi_config()).unwrap();
        let err = trainer.train_epoch(&tiny_patients()).unwrap_err();
        assert!(matches!(err, TrainError::MissingDdiLoss));
    }

    #[test]
    fn test_same_seed_same_training_run() {
        let config = TrainConfig { target_ddi: 0.0, temperature: 0.5, ..config() };
        let mut a = trainer_with_ddi(&config, all_interacting(4));
        let mut b = trainer_with_ddi(&config, all_interacting(4));
        let prefix = tiny_patients()[1].visits.clone();

        for _ in 0..2 {
            let stats_a = a.train_epoch(&tiny_patients()).unwrap();
            let stats_b = b.train_epoch(&tiny_patients()).unwrap();
            assert_eq!(stats_a, stats_b);
        }
        assert_eq!(
            a.model().probabilities(&prefix).unwrap(),
            b.model().probabilities(&prefix).unwrap()
        );
    }

    #[test]
    fn test_gate_stream_differs_from_model_stream() {
        let gate: u64 = StdRng::seed_from_u64(gate_seed(1203)).gen();
        let model: u64 = StdRng::seed_from_u64(1203).gen();
        assert_ne!(gate, model);
        assert_eq!(gate_seed(1203), gate_seed(1203));
    }
}
