use thiserror::Error;

#[derive(Debug, Error)]
pub enum MedrecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<toml::de::Error> for MedrecError {
    fn from(e: toml::de::Error) -> Self {
        MedrecError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MedrecError>;
