use std::fmt::Debug;

use tch::Tensor;

/// Module for which a computation can fail.
pub trait FallibleModuleT: Debug + Send {
    /// The error type.
    type Error;

    /// Apply the module.
    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, Self::Error>;
}

/// Module that is applied to a padded batch of sequences.
pub trait MaskedModule: Debug + Send {
    /// The error type.
    type Error;

    /// Apply the module.
    ///
    /// `input` has shape `[batch_size, seq_len, ...]`, `mask` has shape
    /// `[batch_size, seq_len]` and is non-zero for valid time steps.
    fn forward_masked(&self, input: &Tensor, mask: &Tensor) -> Result<Tensor, Self::Error>;
}
