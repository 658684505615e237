use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported model type \"{0}\"")]
    UnsupportedModelType(String),
    #[error("embed_dim {embed_dim} is not divisible by num_heads {num_heads}")]
    IndivisibleHeads { embed_dim: usize, num_heads: usize },
    #[error(
        "head dim {head_dim} is not divisible by 4, cannot build rotary tables"
    )]
    IndivisibleHeadDim { head_dim: usize },
    #[error("{field} must be non-zero")]
    ZeroField { field: &'static str },
}
