use tch::TchError;
use thiserror::Error;

use crate::crf::CrfError;

/// Errors of the labeler building blocks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransformerError {
    /// CRF error.
    #[error(transparent)]
    Crf(#[from] CrfError),

    /// A tensor does not have the expected shape.
    #[error("{tensor} has shape {actual:?}, expected {expected}")]
    Shape {
        /// The role of the offending tensor.
        tensor: &'static str,

        /// Description of the expected shape.
        expected: String,

        /// The actual shape.
        actual: Vec<i64>,
    },

    /// Torch error.
    #[error(transparent)]
    Tch(#[from] TchError),
}
