use std::path::PathBuf;

use thiserror::Error;

use crate::{config::ConfigError, parameters::ParameterLoaderError};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "Model \"{0}\" not found: not a checkpoint directory and not in the \
        local Hugging Face cache"
    )]
    ModelNotFound(String),
    #[error("Unable to read model configuration at {path:?}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse model configuration at {path:?}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Weights(#[from] ParameterLoaderError),
    #[error(
        "Incompatible weights: \"{key}\" expected shape {expected:?}, got {actual:?}"
    )]
    IncompatibleWeights {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}
