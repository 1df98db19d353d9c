use medrec_common::MedrecError;
use medrec_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Data(#[from] MedrecError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Tensor error: {0}")]
    Candle(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("DDI loss branch selected but the model returned no DDI loss")]
    MissingDdiLoss,
}

impl From<candle_core::Error> for TrainError {
    fn from(e: candle_core::Error) -> Self {
        TrainError::Candle(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;
