//! Linear-chain conditional random field.
//!
//! The CRF scores a label sequence as the sum of per-token emission
//! scores and the scores of the transitions between consecutive labels.
//! Besides the *L* real labels, the transition model has two virtual
//! tags: START (index *L*) precedes every sequence and END (index
//! *L + 1*) follows every sequence. The emission tensor therefore has
//! *L + 2* columns per time step; the two last columns are dummies
//! that align the emissions with the transition matrix.
//!
//! The transition matrix is indexed as `transitions[from, to]` by the
//! forward algorithm, the gold path scorer and the Viterbi decoder.
//! Transitions into START and out of END start with a score of
//! [`FORBIDDEN_TRANSITION_SCORE`]. These scores remain trainable.
//!
//! All operations work on padded batches: emissions have shape
//! `[batch_size, seq_len, n_labels + 2]` and masks have shape
//! `[batch_size, seq_len]`, where the valid time steps of a sequence
//! must form a prefix. Malformed masks are not detected.

use std::borrow::Borrow;
use std::convert::TryFrom;

use seqdot_tch_ext::PathExt;
use tch::{Device, Kind, Tensor};

use crate::module::MaskedModule;

mod error;
pub use error::CrfError;

mod forward;
pub use forward::ForwardScores;

#[cfg(test)]
mod test_helpers;

mod viterbi;

/// Initial score of transitions into START and out of END.
pub const FORBIDDEN_TRANSITION_SCORE: f64 = -10_000.;

/// Linear-chain conditional random field.
#[derive(Debug)]
pub struct Crf {
    n_labels: i64,

    /// Transition scores, shape `[n_tags, n_tags]`, indexed as
    /// `[from, to]`.
    transitions: Tensor,
}

impl Crf {
    /// Construct a CRF for `n_labels` labels.
    ///
    /// The transition matrix is stored as the variable `transitions`
    /// of `vs`.
    pub fn new<'a>(vs: impl Borrow<PathExt<'a>>, n_labels: i64) -> Result<Self, CrfError> {
        if n_labels < 1 {
            return Err(CrfError::NoLabels { n_labels });
        }

        let vs = vs.borrow();

        let n_tags = n_labels + 2;
        let device = vs.device();

        let tags = Tensor::f_arange(n_tags, (Kind::Int64, device))?;
        let into_start = tags.f_eq(n_labels)?.f_unsqueeze(0)?;
        let out_of_end = tags.f_eq(n_labels + 1)?.f_unsqueeze(1)?;
        let forbidden = into_start.f_logical_or(&out_of_end)?;

        let init = Tensor::f_zeros([n_tags, n_tags], (Kind::Float, device))?
            .f_masked_fill(&forbidden, FORBIDDEN_TRANSITION_SCORE)?;

        Ok(Crf {
            n_labels,
            transitions: vs.var_copy("transitions", &init)?,
        })
    }

    /// The number of real labels.
    pub fn n_labels(&self) -> i64 {
        self.n_labels
    }

    /// The number of tags, including START and END.
    pub fn n_tags(&self) -> i64 {
        self.n_labels + 2
    }

    /// Index of the START tag.
    pub fn start_tag(&self) -> i64 {
        self.n_labels
    }

    /// Index of the END tag.
    pub fn end_tag(&self) -> i64 {
        self.n_labels + 1
    }

    /// The transition matrix, indexed as `[from, to]`.
    pub fn transitions(&self) -> &Tensor {
        &self.transitions
    }

    /// Compute the pairwise scores of every time step.
    ///
    /// Returns a tensor of shape `[seq_len, batch_size, n_tags, n_tags]`
    /// where element `[t, b, i, j]` is the score of moving from tag `i`
    /// to tag `j` at step `t` and emitting `j`.
    fn pairwise_scores(&self, emissions: &Tensor) -> Result<Tensor, CrfError> {
        let n_tags = self.n_tags();

        // [batch_size, seq_len, n_tags] -> [seq_len, batch_size, 1, n_tags]
        let emissions = emissions.f_transpose(0, 1)?.f_unsqueeze(2)?;

        Ok(emissions.f_add(&self.transitions.f_view([1, 1, n_tags, n_tags])?)?)
    }

    /// Check the shapes of emissions and mask.
    ///
    /// Returns the batch size and sequence length.
    fn check_inputs(&self, emissions: &Tensor, mask: &Tensor) -> Result<(i64, i64), CrfError> {
        let shape = emissions.size();
        let (batch_size, seq_len) = match *shape.as_slice() {
            [batch_size, seq_len, n_tags] if n_tags == self.n_tags() => (batch_size, seq_len),
            _ => {
                return Err(CrfError::shape(
                    "emissions",
                    format!("[batch_size, seq_len, {}]", self.n_tags()),
                    &shape,
                ))
            }
        };

        check_batch_shape("mask", mask, batch_size, seq_len)?;

        Ok((batch_size, seq_len))
    }
}

impl MaskedModule for Crf {
    type Error = CrfError;

    /// Decode the best label sequences, see [`Crf::decode`].
    fn forward_masked(&self, emissions: &Tensor, mask: &Tensor) -> Result<Tensor, Self::Error> {
        self.decode(emissions, mask)
    }
}

/// Check that a tensor has shape `[batch_size, seq_len]`.
fn check_batch_shape(
    name: &'static str,
    tensor: &Tensor,
    batch_size: i64,
    seq_len: i64,
) -> Result<(), CrfError> {
    let shape = tensor.size();
    if shape != [batch_size, seq_len] {
        return Err(CrfError::shape(
            name,
            format!("[{}, {}]", batch_size, seq_len),
            &shape,
        ));
    }

    Ok(())
}

/// Get the length of every sequence from a boolean mask.
///
/// Sequences without any valid time step are rejected.
fn sequence_lengths(mask: &Tensor) -> Result<Tensor, CrfError> {
    let seq_lens = mask.f_sum_dim_intlist(&[1][..], false, Kind::Int64)?;

    let host_seq_lens = Vec::<i64>::try_from(&seq_lens.f_to_device(Device::Cpu)?)?;
    if let Some(index) = host_seq_lens.iter().position(|&len| len == 0) {
        return Err(CrfError::InvalidSequence { index });
    }

    Ok(seq_lens)
}
