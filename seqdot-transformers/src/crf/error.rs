use tch::TchError;
use thiserror::Error;

/// CRF errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CrfError {
    /// A batch element does not have any valid time step.
    #[error("sequence {index} of the batch does not have any valid time steps")]
    InvalidSequence {
        /// Index of the sequence in the batch.
        index: usize,
    },

    /// The CRF was constructed without labels.
    #[error("a CRF needs at least one label, got {n_labels}")]
    NoLabels { n_labels: i64 },

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

impl CrfError {
    pub(crate) fn shape(tensor: &'static str, expected: impl Into<String>, actual: &[i64]) -> Self {
        CrfError::Shape {
            tensor,
            expected: expected.into(),
            actual: actual.to_owned(),
        }
    }
}
