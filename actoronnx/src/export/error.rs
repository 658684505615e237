use thiserror::Error;

use crate::DataType;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(
        "Component \"{component}\" uses \"{operator}\", which has no opset-17 lowering"
    )]
    UnsupportedOperator { component: String, operator: String },
    #[error(
        "Component \"{component}\" input \"{input}\" expects a rank-{expected_rank} \
        {expected:?} tensor, got a rank-{actual_rank} {actual:?} tensor"
    )]
    ShapeMismatch {
        component: String,
        input: String,
        expected: DataType,
        expected_rank: usize,
        actual: DataType,
        actual_rank: usize,
    },
    #[error(
        "Component \"{component}\" input \"{input}\" has incompatible shape {shape:?}: {reason}"
    )]
    InvalidDimension {
        component: String,
        input: String,
        shape: Vec<usize>,
        reason: String,
    },
    #[error("Component \"{component}\" expects {expected} example inputs, got {actual}")]
    InputArity {
        component: String,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to write artifact")]
    Io(#[from] std::io::Error),
}
