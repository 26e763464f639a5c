use crate::core::io::sdf::SdfError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SD file error: {0}")]
    Sdf(#[from] SdfError),

    #[error("Consistency check failed for record #{record}: {message}")]
    Consistency { record: usize, message: String },
}
