//! Sequence labeling models.

mod labeler;
pub use labeler::{LabelerConfig, SequenceLabeler};

/// Parameter groups of a labeler.
///
/// Optimizers can use a different learning rate or weight decay for
/// each group.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParameterGroup {
    /// Emission projection weights.
    Emissions = 0,

    /// Biases of the emission projection.
    EmissionsNoWeightDecay = 1,

    /// CRF transition scores.
    Transitions = 2,
}

/// Get the parameter group of a variable from its full name.
///
/// This function can be passed to `RootExt::root_ext`.
pub fn parameter_group(name: &str) -> usize {
    let group = if name.ends_with("crf.transitions") {
        ParameterGroup::Transitions
    } else if name.ends_with("bias") {
        ParameterGroup::EmissionsNoWeightDecay
    } else {
        ParameterGroup::Emissions
    };

    group as usize
}
