use thiserror::Error;

use crate::{export::ExportError, model::ModelError};

/// Top-level error of the export pipeline. Nothing is recovered locally;
/// both stages propagate straight to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
