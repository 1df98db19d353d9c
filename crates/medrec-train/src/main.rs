//! MedRec — DDI-aware medication recommendation.
//! Entry point for the training / test binary.

use std::path::PathBuf;

use clap::Parser;
use medrec_common::{DataPaths, Dataset, TrainConfig};
use medrec_train::runner;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Train or bootstrap-test GAMENet
#[derive(Parser, Debug)]
#[command(name = "medrec", version, about, long_about = None)]
struct Cli {
    /// TOML config file; falls back to $MEDREC_CONFIG, then built-in defaults
    #[arg(long, env = "MEDREC_CONFIG")]
    config: Option<PathBuf>,

    /// Evaluate the checkpoint given by --resume-path instead of training
    #[arg(long)]
    test: bool,

    #[arg(long)]
    model_name: Option<String>,

    /// Checkpoint (safetensors) to load before training or testing
    #[arg(long)]
    resume_path: Option<PathBuf>,

    /// DDI-aware training
    #[arg(long)]
    ddi: Option<bool>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,

    #[arg(long)]
    target_ddi: Option<f64>,

    /// Initial annealing temperature
    #[arg(long = "T")]
    temperature: Option<f64>,

    #[arg(long)]
    decay_weight: Option<f64>,

    /// Embedding dimension
    #[arg(long)]
    dim: Option<usize>,

    /// CUDA device index (CPU when omitted)
    #[arg(long)]
    cuda: Option<usize>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Directory holding records.json, voc.json, ehr_adj.json, ddi_adj.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    save_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut TrainConfig) {
        config.test |= self.test;
        if let Some(v) = self.model_name {
            config.model_name = v;
        }
        if let Some(v) = self.resume_path {
            config.resume_path = Some(v);
        }
        if let Some(v) = self.ddi {
            config.ddi = v;
        }
        if let Some(v) = self.lr {
            config.lr = v;
        }
        if let Some(v) = self.target_ddi {
            config.target_ddi = v;
        }
        if let Some(v) = self.temperature {
            config.temperature = v;
        }
        if let Some(v) = self.decay_weight {
            config.decay_weight = v;
        }
        if let Some(v) = self.dim {
            config.dim = v;
        }
        if let Some(v) = self.cuda {
            config.cuda = Some(v);
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.data_dir {
            config.data = DataPaths::in_dir(v);
        }
        if let Some(v) = self.save_dir {
            config.save_dir = v;
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("medrec=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = TrainConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    info!("MedRec {} starting, model {}", env!("CARGO_PKG_VERSION"), config.model_name);
    info!(
        "ddi={}, lr={}, target_ddi={}, T={}, decay_weight={}, dim={}, epochs={}",
        config.ddi, config.lr, config.target_ddi, config.temperature, config.decay_weight, config.dim, config.epochs
    );

    let dataset = Dataset::load(&config.data)?;
    info!(
        "Loaded {} patients / {} visits from {}",
        dataset.patients.len(),
        dataset.visit_count(),
        config.data.records.display()
    );

    if config.test {
        let summary = runner::test(&config, dataset)?;
        println!("{}", summary.render());
    } else {
        runner::train(&config, dataset)?;
    }
    Ok(())
}
