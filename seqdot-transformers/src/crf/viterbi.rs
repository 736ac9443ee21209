use tch::{Kind, Tensor};

use super::{sequence_lengths, Crf, CrfError};

impl Crf {
    /// Find the highest-scoring tag sequence of every batch element.
    ///
    /// `emissions` has shape `[batch_size, seq_len, n_labels + 2]` and
    /// `mask` has shape `[batch_size, seq_len]`. Returns the tags with
    /// shape `[batch_size, seq_len]`. Time steps beyond the length of a
    /// sequence are set to `0`.
    ///
    /// The maximization ranges over all `n_labels + 2` tags. With the
    /// initial transition scores, paths through START or END are never
    /// optimal unless the dummy emission columns outweigh
    /// [`super::FORBIDDEN_TRANSITION_SCORE`]; trained transitions are not
    /// constrained, so callers that map tags to labels must handle tags
    /// `>= n_labels`.
    pub fn decode(&self, emissions: &Tensor, mask: &Tensor) -> Result<Tensor, CrfError> {
        let (_, seq_len) = self.check_inputs(emissions, mask)?;
        let mask = mask.f_ne(0)?;
        let seq_lens = sequence_lengths(&mask)?;

        let pairwise = self.pairwise_scores(emissions)?;

        let mut scores = pairwise.f_select(0, 0)?.f_select(1, self.start_tag())?;
        let mut backpointers = Vec::with_capacity(seq_len as usize);

        for t in 1..seq_len {
            let step_scores = pairwise.f_select(0, t)?.f_add(&scores.f_unsqueeze(2)?)?;
            let (best_scores, best_previous) = step_scores.f_max_dim(1, false)?;

            // Scores are carried over at padding time steps, so that
            // after the last step they are the scores of the last valid
            // time step of each sequence.
            let step_mask = mask.f_select(1, t)?.f_unsqueeze(1)?;
            scores = best_scores.f_where_self(&step_mask, &scores)?;
            backpointers.push(best_previous.f_masked_fill(&step_mask.f_logical_not()?, 0)?);
        }

        let end_transitions = self.transitions.f_select(1, self.end_tag())?;
        let last_tags = scores
            .f_add(&end_transitions.f_unsqueeze(0)?)?
            .f_argmax(-1, false)?;

        // Follow the backpointers from the last valid time step of each
        // sequence.
        let mut pointer = last_tags.f_zeros_like()?;
        let mut tags = Vec::with_capacity(seq_len as usize);
        for t in (0..seq_len).rev() {
            pointer = last_tags.f_where_self(&seq_lens.f_eq(t + 1)?, &pointer)?;
            tags.push(pointer.f_masked_fill(&seq_lens.f_le(t)?, 0)?);

            if t > 0 {
                pointer = backpointers[(t - 1) as usize]
                    .f_gather(1, &pointer.f_unsqueeze(1)?, false)?
                    .f_squeeze_dim(1)?;
            }
        }
        tags.reverse();

        Ok(Tensor::f_stack(tags.as_slice(), 1)?.f_to_kind(Kind::Int64)?)
    }
}
