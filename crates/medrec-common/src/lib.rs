//! medrec-common — Shared types, errors, and configuration used across all MedRec crates.

pub mod error;
pub mod dataset;
pub mod config;

// Re-export commonly used types
pub use config::{DataPaths, TrainConfig};
pub use dataset::{AdjacencyMatrix, Dataset, DatasetSplit, Patient, Visit, VocabSizes, Vocabulary};
pub use error::{MedrecError, Result};
