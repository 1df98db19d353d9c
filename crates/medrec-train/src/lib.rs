//! medrec-train — DDI-aware training and evaluation of GAMENet.
//!
//! Every visit of every training patient gets one forward pass on its
//! history prefix and one optimizer step. The step's loss is either the
//! blended accuracy loss or the model's DDI loss, picked by an annealed
//! gate on the visit's predicted DDI rate (see [`policy`]).

pub mod bootstrap;
pub mod checkpoint;
pub mod error;
pub mod evaluate;
pub mod history;
pub mod loss;
pub mod policy;
pub mod progress;
pub mod runner;
pub mod targets;
pub mod trainer;

pub use bootstrap::{bootstrap_evaluate, BootstrapSummary};
pub use checkpoint::{CheckpointRecord, CheckpointStore};
pub use error::{Result, TrainError};
pub use evaluate::{evaluate, EvalReport};
pub use history::MetricHistory;
pub use policy::{AnnealedLossSelector, LossBranch};
pub use trainer::{EpochStats, FitSummary, Trainer};
