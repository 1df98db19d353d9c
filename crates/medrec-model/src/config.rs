//! Configuration for the GAMENet model.

use serde::{Deserialize, Serialize};

/// Hyperparameters of [`crate::GameNet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Embedding dimension (default: 64)
    pub emb_dim: usize,

    /// Subtract the DDI graph memory from the EHR memory (default: true)
    pub ddi_in_memory: bool,

    /// Dropout on code embeddings (default: 0.4)
    pub embedding_dropout: f32,

    /// Dropout between the two GCN layers (default: 0.3)
    pub gcn_dropout: f32,

    /// Seed for parameter init and dropout masks
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            emb_dim: 64,
            ddi_in_memory: true,
            embedding_dropout: 0.4,
            gcn_dropout: 0.3,
            seed: 1203,
        }
    }
}

impl ModelConfig {
    /// Set the embedding dimension.
    pub fn with_emb_dim(mut self, dim: usize) -> Self {
        self.emb_dim = dim;
        self
    }

    /// Toggle the DDI graph in drug memory.
    pub fn with_ddi_in_memory(mut self, enabled: bool) -> Self {
        self.ddi_in_memory = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
