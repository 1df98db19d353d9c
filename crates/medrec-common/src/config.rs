//! Run configuration.
//!
//! Every field has a default, so a run needs no file at all. When a TOML
//! file is given (via `--config` or the MEDREC_CONFIG env var) its values
//! replace the defaults; command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MedrecError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Evaluate a saved checkpoint instead of training
    #[serde(default)]
    pub test: bool,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Checkpoint blob to load before training or testing
    #[serde(default)]
    pub resume_path: Option<PathBuf>,
    /// DDI-aware training (annealed loss selection + DDI graph in memory)
    #[serde(default = "bool_true")]
    pub ddi: bool,
    #[serde(default = "default_lr")]
    pub lr: f64,
    #[serde(default = "default_target_ddi")]
    pub target_ddi: f64,
    /// Initial annealing temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_decay_weight")]
    pub decay_weight: f64,
    /// Embedding dimension
    #[serde(default = "default_dim")]
    pub dim: usize,
    /// CUDA device index; CPU when unset
    #[serde(default)]
    pub cuda: Option<usize>,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    #[serde(default)]
    pub data: DataPaths,
    #[serde(default = "default_bootstrap_rounds")]
    pub bootstrap_rounds: usize,
    #[serde(default = "default_bootstrap_fraction")]
    pub bootstrap_fraction: f64,
}

fn default_model_name()         -> String  { "GAMENet".to_string() }
fn bool_true()                  -> bool    { true }
fn default_lr()                 -> f64     { 1e-4 }
fn default_target_ddi()         -> f64     { 0.06 }
fn default_temperature()        -> f64     { 2.0 }
fn default_decay_weight()       -> f64     { 0.85 }
fn default_dim()                -> usize   { 64 }
fn default_epochs()             -> usize   { 50 }
fn default_seed()               -> u64     { 1203 }
fn default_save_dir()           -> PathBuf { PathBuf::from("saved") }
fn default_bootstrap_rounds()   -> usize   { 10 }
fn default_bootstrap_fraction() -> f64     { 0.8 }

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test: false,
            model_name: default_model_name(),
            resume_path: None,
            ddi: bool_true(),
            lr: default_lr(),
            target_ddi: default_target_ddi(),
            temperature: default_temperature(),
            decay_weight: default_decay_weight(),
            dim: default_dim(),
            cuda: None,
            epochs: default_epochs(),
            seed: default_seed(),
            save_dir: default_save_dir(),
            data: DataPaths::default(),
            bootstrap_rounds: default_bootstrap_rounds(),
            bootstrap_fraction: default_bootstrap_fraction(),
        }
    }
}

/// Locations of the preprocessed input artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    pub records: PathBuf,
    pub vocabulary: PathBuf,
    pub ehr_adj: PathBuf,
    pub ddi_adj: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::in_dir("data/output")
    }
}

impl DataPaths {
    /// Standard file names under one directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            records: dir.join("records.json"),
            vocabulary: dir.join("voc.json"),
            ehr_adj: dir.join("ehr_adj.json"),
            ddi_adj: dir.join("ddi_adj.json"),
        }
    }
}

impl TrainConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MedrecError::Config(format!("Config file not found: {}", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        let config: TrainConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from an explicit path, else from MEDREC_CONFIG, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match std::env::var("MEDREC_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Directory holding this run's checkpoints and history.
    pub fn run_dir(&self) -> PathBuf {
        self.save_dir.join(&self.model_name)
    }
}
