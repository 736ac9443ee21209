use std::convert::{TryFrom, TryInto};

use ndarray::{s, Array1, Array2};
use tch::{Kind, TchError, Tensor};

/// Build batch tensors of label sequences.
///
/// Sequences are padded to the maximum sequence length of the batch.
/// Padding time steps have label `0` and mask `0`.
pub struct LabelBatchBuilder {
    current_sequence: usize,
    labels: Array2<i64>,
    mask: Array2<i32>,
    seq_lens: Array1<i64>,
}

impl LabelBatchBuilder {
    /// Create a builder for `batch_size` sequences of at most
    /// `max_seq_len` time steps.
    pub fn new(batch_size: usize, max_seq_len: usize) -> Self {
        LabelBatchBuilder {
            current_sequence: 0,
            labels: Array2::zeros((batch_size, max_seq_len)),
            mask: Array2::zeros((batch_size, max_seq_len)),
            seq_lens: Array1::zeros((batch_size,)),
        }
    }

    /// Add the label numbers of a sequence.
    ///
    /// Panics when the builder is already filled or when the sequence
    /// is longer than the maximum sequence length.
    pub fn add(&mut self, labels: &[i64]) {
        assert!(
            self.current_sequence < self.labels.nrows(),
            "LabelBatchBuilder is already filled."
        );

        assert!(
            labels.len() <= self.labels.ncols(),
            "Sequence length ({}) exceeds the maximum sequence length ({})",
            labels.len(),
            self.labels.ncols()
        );

        self.labels
            .row_mut(self.current_sequence)
            .slice_mut(s![0..labels.len()])
            .assign(&Array1::from(labels.to_vec()));

        self.mask
            .row_mut(self.current_sequence)
            .slice_mut(s![0..labels.len()])
            .fill(1);

        self.seq_lens[self.current_sequence] = labels.len() as i64;

        self.current_sequence += 1
    }
}

/// Tensors constructed by `LabelBatchBuilder`.
#[derive(Debug)]
pub struct LabelBatch {
    /// Labels, shape `[batch_size, max_seq_len]`.
    pub labels: Tensor,

    /// Mask of valid time steps, shape `[batch_size, max_seq_len]`.
    pub mask: Tensor,

    /// Sequence lengths, shape `[batch_size]`.
    pub seq_lens: Tensor,
}

impl TryFrom<LabelBatchBuilder> for LabelBatch {
    type Error = TchError;

    fn try_from(builder: LabelBatchBuilder) -> Result<Self, Self::Error> {
        Ok(LabelBatch {
            labels: builder.labels.try_into()?,
            mask: builder.mask.try_into()?,
            seq_lens: builder.seq_lens.try_into()?,
        })
    }
}

/// Construct a boolean mask from sequence lengths.
///
/// Returns a tensor of shape `[batch_size, max_len]` that is `true` for
/// the first `seq_lens[i]` time steps of sequence `i`.
pub fn seq_len_to_mask(seq_lens: &Tensor, max_len: i64) -> Result<Tensor, TchError> {
    let positions = Tensor::f_arange(max_len, (Kind::Int64, seq_lens.device()))?;
    positions
        .f_unsqueeze(0)?
        .f_lt_tensor(&seq_lens.f_to_kind(Kind::Int64)?.f_unsqueeze(1)?)
}

#[cfg(test)]
mod tests {
    use std::convert::TryInto;

    use tch::Tensor;

    use super::{seq_len_to_mask, LabelBatch, LabelBatchBuilder};

    #[test]
    fn sequences_are_added() {
        let mut builder = LabelBatchBuilder::new(2, 3);
        builder.add(&[1, 2]);
        builder.add(&[3, 4, 5]);

        let batch: LabelBatch = builder.try_into().unwrap();

        assert_eq!(
            batch.labels,
            Tensor::from_slice(&[1i64, 2, 0, 3, 4, 5]).reshape([2, 3])
        );
        assert_eq!(
            batch.mask,
            Tensor::from_slice(&[1i32, 1, 0, 1, 1, 1]).reshape([2, 3])
        );
        assert_eq!(batch.seq_lens, Tensor::from_slice(&[2i64, 3]));
    }

    #[test]
    fn mask_is_constructed_from_lengths() {
        let mask = seq_len_to_mask(&Tensor::from_slice(&[2i64, 4, 1]), 4).unwrap();
        assert_eq!(
            mask,
            Tensor::from_slice(&[
                true, true, false, false, //
                true, true, true, true, //
                true, false, false, false
            ])
            .reshape([3, 4])
        );
    }

    #[should_panic]
    #[test]
    fn panics_when_too_many_sequences_added() {
        let mut builder = LabelBatchBuilder::new(1, 3);
        builder.add(&[1, 2]);
        builder.add(&[3, 4, 5]);
    }

    #[should_panic]
    #[test]
    fn panics_when_sequence_is_too_long() {
        let mut builder = LabelBatchBuilder::new(1, 2);
        builder.add(&[1, 2, 3]);
    }
}
