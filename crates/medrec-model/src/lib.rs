//! MedRec Model
//!
//! Pure Rust GAMENet (graph-augmented memory network) using Candle.
//!
//! # Features
//! - Per-visit diagnosis/procedure embeddings fed to two GRU encoders
//! - Drug memory from a GCN over the EHR co-occurrence graph, with the DDI
//!   graph subtracted when DDI memory is enabled
//! - Auxiliary DDI loss in training mode
//! - Seeded parameter init and dropout, so CPU runs are reproducible
//!
//! # Example
//! ```rust,no_run
//! use candle_nn::VarMap;
//! use medrec_model::{select_device, GameNet, ModelConfig, Mode, SequentialPredictor};
//! # fn run(dataset: medrec_common::Dataset) -> medrec_model::Result<()> {
//! let device = select_device(None)?;
//! let varmap = VarMap::new();
//! let model = GameNet::from_varmap(
//!     &varmap,
//!     ModelConfig::default(),
//!     dataset.vocab,
//!     &dataset.ehr_adj,
//!     &dataset.ddi_adj,
//!     &device,
//! )?;
//!
//! let patient = &dataset.patients[0];
//! let probs = model.probabilities(patient.prefix(0))?;
//! println!("P(drug 0) = {:.3}", probs[0]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod dropout;
pub mod error;
pub mod gamenet;
pub mod gcn;
pub mod init;
pub mod predictor;

pub use config::ModelConfig;
pub use device::select_device;
pub use error::{ModelError, Result};
pub use gamenet::GameNet;
pub use predictor::{Mode, Prediction, SequentialPredictor};
