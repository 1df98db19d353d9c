//! Wiring from a [`TrainConfig`] to a training or test run.

use std::time::Instant;

use candle_nn::VarMap;
use medrec_common::{Dataset, DatasetSplit, TrainConfig};
use medrec_metrics::DdiScorer;
use medrec_model::gamenet::parameter_count;
use medrec_model::{select_device, GameNet, ModelConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::bootstrap::{bootstrap_evaluate, BootstrapSummary};
use crate::checkpoint::{load_weights, CheckpointStore};
use crate::trainer::{FitSummary, Trainer};
use crate::{Result, TrainError};

/// Model, its parameters and the DDI scorer, built from the dataset.
struct Prepared {
    model: GameNet,
    varmap: VarMap,
    scorer: DdiScorer,
    split: DatasetSplit,
}

fn prepare(config: &TrainConfig, dataset: Dataset) -> Result<Prepared> {
    let Dataset { patients, vocab, ehr_adj, ddi_adj } = dataset;
    let split = DatasetSplit::from_patients(patients);
    info!(
        "Split: {} train / {} test / {} eval patients",
        split.train.len(),
        split.test.len(),
        split.eval.len()
    );

    let device = select_device(config.cuda)?;
    let mut varmap = VarMap::new();
    let model_config = ModelConfig::default()
        .with_emb_dim(config.dim)
        .with_ddi_in_memory(config.ddi)
        .with_seed(config.seed);
    let model = GameNet::from_varmap(&varmap, model_config, vocab, &ehr_adj, &ddi_adj, &device)?;
    info!("parameters: {}", parameter_count(&varmap));

    if let Some(path) = &config.resume_path {
        load_weights(&mut varmap, path)?;
    }

    Ok(Prepared { model, varmap, scorer: DdiScorer::new(ddi_adj), split })
}

/// Train on the train split, validating on the eval split every epoch.
pub fn train(config: &TrainConfig, dataset: Dataset) -> Result<FitSummary> {
    let Prepared { model, varmap, scorer, split } = prepare(config, dataset)?;
    let mut store = CheckpointStore::open(config.run_dir())?;
    let mut trainer = Trainer::new(model, varmap, scorer, config)?;
    let summary = trainer.fit(&split.train, &split.eval, &mut store, config.epochs)?;
    info!(
        "Training finished: best epoch {} (Jaccard {:.4})",
        summary.best_epoch, summary.best_jaccard
    );
    Ok(summary)
}

/// Bootstrap-evaluate the checkpoint at `resume_path` on the test split.
pub fn test(config: &TrainConfig, dataset: Dataset) -> Result<BootstrapSummary> {
    if config.resume_path.is_none() {
        return Err(TrainError::Checkpoint("test mode requires a resume path".to_string()));
    }
    let Prepared { model, scorer, split, .. } = prepare(config, dataset)?;

    let started = Instant::now();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let summary = bootstrap_evaluate(
        &model,
        &split.test,
        &scorer,
        config.bootstrap_rounds,
        config.bootstrap_fraction,
        &mut rng,
    )?;
    info!("test time: {:.2?}", started.elapsed());
    Ok(summary)
}
