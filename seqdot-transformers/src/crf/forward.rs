use tch::{Kind, Tensor};

use super::{check_batch_shape, sequence_lengths, Crf, CrfError};
use crate::util::LogSumExp;

/// Scores computed by the forward algorithm.
#[derive(Debug)]
pub struct ForwardScores {
    /// Log-partition function of each sequence, shape `[batch_size]`.
    pub log_partition: Tensor,

    /// Pairwise scores, shape `[seq_len, batch_size, n_tags, n_tags]`.
    ///
    /// Element `[t, b, i, j]` is the transition score from `i` to `j`
    /// plus the emission score of `j` at time step `t`.
    pub pairwise: Tensor,
}

impl ForwardScores {
    /// The sum of the log-partition functions of the batch.
    pub fn log_partition_sum(&self) -> Result<Tensor, CrfError> {
        Ok(self.log_partition.f_sum(self.log_partition.kind())?)
    }
}

impl Crf {
    /// Compute the log-partition function with the forward algorithm.
    ///
    /// `emissions` has shape `[batch_size, seq_len, n_labels + 2]`,
    /// `mask` has shape `[batch_size, seq_len]`. The forward variables
    /// of a sequence are not updated at its padding time steps.
    pub fn forward_scores(
        &self,
        emissions: &Tensor,
        mask: &Tensor,
    ) -> Result<ForwardScores, CrfError> {
        let (_, seq_len) = self.check_inputs(emissions, mask)?;
        let mask = mask.f_ne(0)?;
        sequence_lengths(&mask)?;

        let pairwise = self.pairwise_scores(emissions)?;

        // Every path starts with a transition from START.
        let mut partition = pairwise.f_select(0, 0)?.f_select(1, self.start_tag())?;

        for t in 1..seq_len {
            // partition: [batch_size, n_tags] is the 'from' axis of
            // the step scores: [batch_size, n_tags, n_tags].
            let step_scores = pairwise
                .f_select(0, t)?
                .f_add(&partition.f_unsqueeze(2)?)?;
            let step_partition = step_scores.log_sum_exp(1)?;

            let step_mask = mask.f_select(1, t)?.f_unsqueeze(1)?;
            partition = step_partition.f_where_self(&step_mask, &partition)?;
        }

        let end_transitions = self.transitions.f_select(1, self.end_tag())?;
        let log_partition = partition
            .f_add(&end_transitions.f_unsqueeze(0)?)?
            .log_sum_exp(1)?;

        Ok(ForwardScores {
            log_partition,
            pairwise,
        })
    }

    /// Compute the scores of the gold-standard label sequences.
    ///
    /// `pairwise` are the pairwise scores computed by
    /// [`Crf::forward_scores`]. `tags` has shape `[batch_size, seq_len]`
    /// with labels in `[0, n_labels)` at valid time steps; labels at
    /// padding time steps are ignored. Returns the score of each
    /// sequence, shape `[batch_size]`.
    pub fn gold_path_scores(
        &self,
        pairwise: &Tensor,
        mask: &Tensor,
        tags: &Tensor,
    ) -> Result<Tensor, CrfError> {
        let n_tags = self.n_tags();

        let shape = pairwise.size();
        let (seq_len, batch_size) = match *shape.as_slice() {
            [seq_len, batch_size, from, to] if from == n_tags && to == n_tags => {
                (seq_len, batch_size)
            }
            _ => {
                return Err(CrfError::shape(
                    "pairwise scores",
                    format!("[seq_len, batch_size, {}, {}]", n_tags, n_tags),
                    &shape,
                ))
            }
        };
        check_batch_shape("mask", mask, batch_size, seq_len)?;
        check_batch_shape("tags", tags, batch_size, seq_len)?;

        let mask = mask.f_ne(0)?;
        let padding = mask.f_logical_not()?;
        let seq_lens = sequence_lengths(&mask)?;

        let tags = tags.f_to_kind(Kind::Int64)?.f_masked_fill(&padding, 0)?;

        // The tag that each transition starts from.
        let start = Tensor::f_full(
            [batch_size, 1],
            self.start_tag(),
            (Kind::Int64, tags.device()),
        )?;
        let previous = Tensor::f_cat(&[&start, &tags.f_narrow(1, 0, seq_len - 1)?], 1)?;

        // Index of each transition in a flattened [from, to] plane.
        let transitions_taken = previous.f_mul_scalar(n_tags)?.f_add(&tags)?;

        let step_scores = pairwise
            .f_reshape([seq_len, batch_size, n_tags * n_tags])?
            .f_gather(2, &transitions_taken.f_transpose(0, 1)?.f_unsqueeze(2)?, false)?
            .f_squeeze_dim(2)?
            .f_transpose(0, 1)?
            .f_masked_fill(&padding, 0.)?;
        let path_scores = step_scores.f_sum_dim_intlist(&[1][..], false, step_scores.kind())?;

        // Add the transition from the last valid tag to END.
        let last_tags = tags
            .f_gather(1, &seq_lens.f_sub_scalar(1)?.f_unsqueeze(1)?, false)?
            .f_squeeze_dim(1)?;
        let end_scores = self
            .transitions
            .f_select(1, self.end_tag())?
            .f_gather(0, &last_tags, false)?;

        Ok(path_scores.f_add(&end_scores)?)
    }

    /// Compute the negative log-likelihood loss.
    ///
    /// The loss is the difference between the log-partition functions
    /// and the gold path scores, summed over the batch and divided by
    /// the batch size.
    pub fn loss(&self, emissions: &Tensor, mask: &Tensor, tags: &Tensor) -> Result<Tensor, CrfError> {
        let forward = self.forward_scores(emissions, mask)?;
        let gold_scores = self.gold_path_scores(&forward.pairwise, mask, tags)?;

        let batch_size = forward.log_partition.size()[0];

        Ok(forward
            .log_partition_sum()?
            .f_sub(&gold_scores.f_sum(gold_scores.kind())?)?
            .f_div_scalar(batch_size as f64)?)
    }
}
