use tch::{Kind, Tensor};

use crate::TransformerError;

/// Token-level cross-entropy loss over padded sequences.
///
/// This is the loss of a labeler that predicts every token
/// independently. The CRF loss in [`crate::crf`] generalizes it by
/// also scoring label transitions.
#[derive(Clone, Debug)]
pub struct CrossEntropyLoss {
    label_smoothing: Option<f64>,
}

impl CrossEntropyLoss {
    /// Construct the cross-entropy loss function.
    ///
    /// If `label_smoothing` is set to *p*, then the correct label gets
    /// probability *1-p* and the probability *p* is distributed across
    /// incorrect labels.
    pub fn new(label_smoothing: Option<f64>) -> Self {
        if let Some(label_smoothing) = label_smoothing {
            assert!(
                (0.0..1.0).contains(&label_smoothing),
                "Label smoothing should be in [0,1), was: {}",
                label_smoothing
            );
        }

        CrossEntropyLoss { label_smoothing }
    }

    /// Compute the mean loss of the valid tokens.
    ///
    /// `logits` should be the unnormalized label scores of shape
    /// `[batch_size, seq_len, n_labels]`, `targets` the gold-standard
    /// labels with shape `[batch_size, seq_len]` and `mask` is non-zero
    /// for valid time steps.
    pub fn forward(
        &self,
        logits: &Tensor,
        targets: &Tensor,
        mask: &Tensor,
    ) -> Result<Tensor, TransformerError> {
        let losses = self.token_losses(logits, targets, mask)?;
        let n_tokens = mask.f_ne(0)?.f_sum(Kind::Float)?;
        Ok(losses.f_sum(Kind::Float)?.f_div(&n_tokens)?)
    }

    /// Compute the loss of each token.
    ///
    /// Returns a tensor of shape `[batch_size, seq_len]`, the losses of
    /// padding tokens are zero.
    pub fn token_losses(
        &self,
        logits: &Tensor,
        targets: &Tensor,
        mask: &Tensor,
    ) -> Result<Tensor, TransformerError> {
        let (batch_size, seq_len, n_labels) = logits.size3()?;
        for &(name, tensor) in &[("targets", targets), ("mask", mask)] {
            if tensor.size() != [batch_size, seq_len] {
                return Err(TransformerError::Shape {
                    tensor: name,
                    expected: format!("[{}, {}]", batch_size, seq_len),
                    actual: tensor.size(),
                });
            }
        }

        let padding = mask.f_ne(0)?.f_logical_not()?;

        // Padding may use labels that are not valid indices.
        let targets = targets
            .f_to_kind(Kind::Int64)?
            .f_masked_fill(&padding, 0)?;

        let log_probs = logits.f_log_softmax(-1, Kind::Float)?;
        let target_log_probs = log_probs
            .f_gather(-1, &targets.f_unsqueeze(-1)?, false)?
            .f_squeeze_dim(-1)?;

        let losses = match self.label_smoothing {
            Some(label_smoothing) if n_labels > 1 => {
                let other_log_probs = log_probs
                    .f_sum_dim_intlist(&[-1][..], false, Kind::Float)?
                    .f_sub(&target_log_probs)?;
                target_log_probs
                    .f_mul_scalar(-(1. - label_smoothing))?
                    .f_sub(&other_log_probs.f_mul_scalar(label_smoothing / (n_labels - 1) as f64)?)?
            }
            _ => target_log_probs.f_neg()?,
        };

        Ok(losses.f_masked_fill(&padding, 0.)?)
    }
}
