use std::borrow::Borrow;
use std::convert::TryFrom;

use seqdot_tch_ext::PathExt;
use seqdot_transformers::crf::Crf;
use seqdot_transformers::layers::Dropout;
use seqdot_transformers::loss::CrossEntropyLoss;
use seqdot_transformers::module::FallibleModuleT;
use seqdot_transformers::TransformerError;
use tch::nn::init::DEFAULT_KAIMING_UNIFORM;
use tch::nn::{Linear, Module};
use tch::{Device, Kind, Tensor};

use crate::config::LabelerHead;
use crate::error::SeqDotError;
use crate::labels::Labels;

/// Hyper-parameters of a sequence labeler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelerConfig {
    /// Dropout probability of the encoder hidden states.
    pub dropout: f64,

    /// The output layer.
    pub head: LabelerHead,

    /// Size of the encoder hidden states.
    pub hidden_size: i64,

    /// The number of labels.
    pub n_labels: i64,
}

impl LabelerConfig {
    /// Check that the hyper-parameters are in range.
    pub fn validate(&self) -> Result<(), SeqDotError> {
        if self.n_labels < 1 {
            return Err(SeqDotError::IllegalConfiguration(format!(
                "the labeler needs at least one label, got {}",
                self.n_labels
            )));
        }

        if self.hidden_size < 1 {
            return Err(SeqDotError::IllegalConfiguration(format!(
                "hidden size should be positive, was: {}",
                self.hidden_size
            )));
        }

        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SeqDotError::IllegalConfiguration(format!(
                "dropout should be in [0,1), was: {}",
                self.dropout
            )));
        }

        if let LabelerHead::Softmax {
            label_smoothing: Some(label_smoothing),
        } = self.head
        {
            if !(0.0..1.0).contains(&label_smoothing) {
                return Err(SeqDotError::IllegalConfiguration(format!(
                    "label smoothing should be in [0,1), was: {}",
                    label_smoothing
                )));
            }
        }

        Ok(())
    }
}

/// Projection of hidden states to emission scores.
#[derive(Debug)]
struct EmissionProjection {
    dropout: Dropout,
    linear: Linear,
}

impl EmissionProjection {
    fn new<'a>(
        vs: impl Borrow<PathExt<'a>>,
        hidden_size: i64,
        n_outputs: i64,
        dropout: f64,
    ) -> Result<Self, TransformerError> {
        let vs = vs.borrow();

        Ok(EmissionProjection {
            dropout: Dropout::new(dropout),
            linear: Linear {
                ws: vs.var("weight", &[n_outputs, hidden_size], DEFAULT_KAIMING_UNIFORM)?,
                bs: Some(vs.zeros("bias", &[n_outputs])?),
            },
        })
    }
}

impl FallibleModuleT for EmissionProjection {
    type Error = TransformerError;

    fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor, Self::Error> {
        let hidden = self.dropout.forward_t(input, train)?;
        Ok(self.linear.forward(&hidden))
    }
}

#[derive(Debug)]
enum Head {
    Crf(Crf),
    Softmax(CrossEntropyLoss),
}

/// Sequence labeler on top of encoder hidden states.
///
/// The labeler projects hidden states to per-token emission scores.
/// With a CRF head, the emission scores have two extra columns for the
/// START and END tags of the CRF and labels are predicted jointly.
/// With a softmax head, every token is labeled independently.
#[derive(Debug)]
pub struct SequenceLabeler {
    emissions: EmissionProjection,
    head: Head,
    n_labels: i64,
}

impl SequenceLabeler {
    pub fn new<'a>(
        vs: impl Borrow<PathExt<'a>>,
        config: &LabelerConfig,
    ) -> Result<Self, SeqDotError> {
        config.validate()?;

        let vs = vs.borrow();

        let (head, n_outputs) = match config.head {
            LabelerHead::Crf => {
                let crf = Crf::new(vs / "crf", config.n_labels)?;
                let n_tags = crf.n_tags();
                (Head::Crf(crf), n_tags)
            }
            LabelerHead::Softmax { label_smoothing } => (
                Head::Softmax(CrossEntropyLoss::new(label_smoothing)),
                config.n_labels,
            ),
        };

        log::debug!(
            "Sequence labeler with {} labels, {} emission scores per token, head: {:?}",
            config.n_labels,
            n_outputs,
            config.head
        );

        Ok(SequenceLabeler {
            emissions: EmissionProjection::new(
                vs / "emissions",
                config.hidden_size,
                n_outputs,
                config.dropout,
            )?,
            head,
            n_labels: config.n_labels,
        })
    }

    /// The number of labels.
    pub fn n_labels(&self) -> i64 {
        self.n_labels
    }

    /// The CRF of the labeler, if it has a CRF head.
    pub fn crf(&self) -> Option<&Crf> {
        match &self.head {
            Head::Crf(crf) => Some(crf),
            Head::Softmax(_) => None,
        }
    }

    /// Compute emission scores.
    ///
    /// `hidden` has shape `[batch_size, seq_len, hidden_size]`.
    pub fn emissions(&self, hidden: &Tensor, train: bool) -> Result<Tensor, SeqDotError> {
        Ok(self.emissions.forward_t(hidden, train)?)
    }

    /// Compute the loss of the gold-standard `labels`.
    ///
    /// `mask` and `labels` have shape `[batch_size, seq_len]`. Labels
    /// of padding time steps are ignored.
    pub fn loss(
        &self,
        hidden: &Tensor,
        mask: &Tensor,
        labels: &Tensor,
        train: bool,
    ) -> Result<Tensor, SeqDotError> {
        let emissions = self.emissions(hidden, train)?;

        match &self.head {
            Head::Crf(crf) => Ok(crf.loss(&emissions, mask, labels)?),
            Head::Softmax(cross_entropy) => {
                Ok(cross_entropy.forward(&emissions, labels, mask)?)
            }
        }
    }

    /// Predict the best label sequences.
    ///
    /// Returns label numbers of shape `[batch_size, seq_len]`, padding
    /// time steps are `0`.
    pub fn decode(&self, hidden: &Tensor, mask: &Tensor) -> Result<Tensor, SeqDotError> {
        let emissions = self.emissions(hidden, false)?;

        match &self.head {
            Head::Crf(crf) => Ok(crf.decode(&emissions, mask)?),
            Head::Softmax(_) => {
                let shape = mask.size();
                let emissions_shape = emissions.size();
                let expected = &emissions_shape[..2];
                if shape != expected {
                    return Err(TransformerError::Shape {
                        tensor: "mask",
                        expected: format!("{:?}", expected),
                        actual: shape,
                    }
                    .into());
                }

                Ok(emissions
                    .f_argmax(-1, false)?
                    .f_masked_fill(&mask.f_eq(0)?, 0)?)
            }
        }
    }

    /// Predict the best label sequences as labels.
    ///
    /// Every label sequence has the length of its sequence in `mask`.
    pub fn decode_labels(
        &self,
        hidden: &Tensor,
        mask: &Tensor,
        labels: &Labels,
    ) -> Result<Vec<Vec<String>>, SeqDotError> {
        let predictions = self.decode(hidden, mask)?.f_to_device(Device::Cpu)?;
        let seq_lens = Vec::<i64>::try_from(
            &mask
                .f_ne(0)?
                .f_sum_dim_intlist(&[1][..], false, Kind::Int64)?
                .f_to_device(Device::Cpu)?,
        )?;

        seq_lens
            .into_iter()
            .enumerate()
            .map(|(idx, seq_len)| {
                let numbers = Vec::<i64>::try_from(
                    &predictions.f_get(idx as i64)?.f_narrow(0, 0, seq_len)?,
                )?;
                labels.decode(&numbers)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryInto;

    use maplit::btreeset;
    use seqdot_tch_ext::RootExt;
    use tch::nn::VarStore;
    use tch::{Device, Kind, Tensor};

    use super::{LabelerConfig, SequenceLabeler};
    use crate::config::LabelerHead;
    use crate::error::SeqDotError;
    use crate::labels::Labels;
    use crate::model::parameter_group;

    const HIDDEN_SIZE: i64 = 8;

    fn labeler_config(head: LabelerHead) -> LabelerConfig {
        LabelerConfig {
            dropout: 0.1,
            head,
            hidden_size: HIDDEN_SIZE,
            n_labels: 3,
        }
    }

    fn labels() -> Labels {
        Labels::from_labels(vec!["O", "B-PER", "I-PER"]).unwrap()
    }

    #[test]
    fn crf_labeler_has_emissions_and_transitions() {
        let vs = VarStore::new(Device::Cpu);
        let labeler =
            SequenceLabeler::new(vs.root_ext(parameter_group), &labeler_config(LabelerHead::Crf))
                .unwrap();

        assert_eq!(labeler.n_labels(), 3);
        assert!(labeler.crf().is_some());

        let variables = vs.variables();
        assert_eq!(
            variables.keys().map(String::as_str).collect::<std::collections::BTreeSet<_>>(),
            btreeset!["crf.transitions", "emissions.bias", "emissions.weight"]
        );
        assert_eq!(variables["emissions.weight"].size(), &[5, HIDDEN_SIZE]);
        assert_eq!(
            variables["emissions.bias"],
            Tensor::zeros([5], (Kind::Float, Device::Cpu))
        );

        tch::manual_seed(42);
        let hidden = Tensor::randn([2, 4, HIDDEN_SIZE], (Kind::Float, Device::Cpu));
        assert_eq!(
            labeler.emissions(&hidden, false).unwrap().size(),
            &[2, 4, 5]
        );
    }

    #[test]
    fn softmax_labeler_has_emissions_only() {
        let vs = VarStore::new(Device::Cpu);
        let labeler = SequenceLabeler::new(
            vs.root_ext(parameter_group),
            &labeler_config(LabelerHead::Softmax {
                label_smoothing: None,
            }),
        )
        .unwrap();

        assert!(labeler.crf().is_none());
        assert_eq!(vs.variables()["emissions.weight"].size(), &[3, HIDDEN_SIZE]);
    }

    #[test]
    fn crf_labeler_loss_and_decoding() {
        let vs = VarStore::new(Device::Cpu);
        let labeler =
            SequenceLabeler::new(vs.root_ext(parameter_group), &labeler_config(LabelerHead::Crf))
                .unwrap();

        tch::manual_seed(42);
        let hidden = Tensor::randn([2, 4, HIDDEN_SIZE], (Kind::Float, Device::Cpu));
        let mask = Tensor::from_slice(&[1i64, 1, 1, 1, 1, 1, 0, 0]).view([2, 4]);
        let gold = Tensor::from_slice(&[1i64, 2, 0, 0, 0, 1, 0, 0]).view([2, 4]);

        let loss: f32 = (&labeler.loss(&hidden, &mask, &gold, true).unwrap())
            .try_into()
            .unwrap();
        assert!(loss.is_finite());
        assert!(loss >= 0.);

        let predictions = labeler.decode(&hidden, &mask).unwrap();
        assert_eq!(predictions.size(), &[2, 4]);
        let padding: Vec<i64> = (&predictions.get(1).narrow(0, 2, 2)).try_into().unwrap();
        assert_eq!(padding, vec![0, 0]);

        let predicted_labels = labeler.decode_labels(&hidden, &mask, &labels()).unwrap();
        assert_eq!(predicted_labels.len(), 2);
        assert_eq!(predicted_labels[0].len(), 4);
        assert_eq!(predicted_labels[1].len(), 2);
    }

    #[test]
    fn softmax_labeler_loss_and_decoding() {
        let vs = VarStore::new(Device::Cpu);
        let labeler = SequenceLabeler::new(
            vs.root_ext(parameter_group),
            &labeler_config(LabelerHead::Softmax {
                label_smoothing: Some(0.1),
            }),
        )
        .unwrap();

        tch::manual_seed(42);
        let hidden = Tensor::randn([2, 3, HIDDEN_SIZE], (Kind::Float, Device::Cpu));
        let mask = Tensor::from_slice(&[1i64, 1, 1, 1, 0, 0]).view([2, 3]);
        let gold = Tensor::from_slice(&[0i64, 1, 2, 2, 0, 0]).view([2, 3]);

        let loss: f32 = (&labeler.loss(&hidden, &mask, &gold, false).unwrap())
            .try_into()
            .unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.);

        let expected = labeler
            .emissions(&hidden, false)
            .unwrap()
            .argmax(-1, false)
            .masked_fill(&mask.eq(0), 0);
        assert_eq!(labeler.decode(&hidden, &mask).unwrap(), expected);

        let predicted_labels = labeler.decode_labels(&hidden, &mask, &labels()).unwrap();
        assert_eq!(predicted_labels[0].len(), 3);
        assert_eq!(predicted_labels[1].len(), 1);
    }

    #[test]
    fn mismatching_mask_is_rejected() {
        let vs = VarStore::new(Device::Cpu);
        let root = vs.root_ext(parameter_group);
        let crf_labeler =
            SequenceLabeler::new(&root / "crf_labeler", &labeler_config(LabelerHead::Crf))
                .unwrap();
        let softmax_labeler = SequenceLabeler::new(
            &root / "softmax_labeler",
            &labeler_config(LabelerHead::Softmax {
                label_smoothing: None,
            }),
        )
        .unwrap();

        let hidden = Tensor::zeros([2, 3, HIDDEN_SIZE], (Kind::Float, Device::Cpu));
        let mask = Tensor::ones([2, 4], (Kind::Int64, Device::Cpu));

        assert!(matches!(
            crf_labeler.decode(&hidden, &mask),
            Err(SeqDotError::Transformer(_))
        ));
        assert!(matches!(
            softmax_labeler.decode(&hidden, &mask),
            Err(SeqDotError::Transformer(_))
        ));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let vs = VarStore::new(Device::Cpu);
        let root = vs.root_ext(parameter_group);

        let mut config = labeler_config(LabelerHead::Crf);
        config.dropout = 1.0;
        assert!(matches!(
            SequenceLabeler::new(&root / "dropout", &config),
            Err(SeqDotError::IllegalConfiguration(_))
        ));

        let config = labeler_config(LabelerHead::Softmax {
            label_smoothing: Some(1.0),
        });
        assert!(matches!(
            SequenceLabeler::new(&root / "label_smoothing", &config),
            Err(SeqDotError::IllegalConfiguration(_))
        ));

        let mut config = labeler_config(LabelerHead::Crf);
        config.n_labels = 0;
        assert!(matches!(
            SequenceLabeler::new(&root / "no_labels", &config),
            Err(SeqDotError::IllegalConfiguration(_))
        ));

        // Nothing is allocated for rejected configurations.
        assert!(vs.variables().is_empty());
    }
}
