use std::convert::TryInto;

use itertools::Itertools;
use ndarray::{s, Array2, ArrayD, ArrayView2, Ix2};
use tch::{Device, Kind, Tensor};

use super::Crf;

fn to_array2(tensor: &Tensor) -> Array2<f64> {
    let array: ArrayD<f32> = (&tensor.detach().to_device(Device::Cpu).to_kind(Kind::Float))
        .try_into()
        .unwrap();
    array.into_dimensionality::<Ix2>().unwrap().mapv(f64::from)
}

/// Overwrite the transition scores of a CRF.
pub fn set_transitions(crf: &Crf, transitions: &Tensor) {
    tch::no_grad(|| {
        let mut target = crf.transitions().shallow_clone();
        target.copy_(transitions);
    });
}

pub fn transitions_array(crf: &Crf) -> Array2<f64> {
    to_array2(crf.transitions())
}

/// Get the emissions of the first `len` time steps of a batch element.
pub fn emissions_array(emissions: &Tensor, idx: usize, len: usize) -> Array2<f64> {
    let emissions = to_array2(&emissions.get(idx as i64));
    emissions.slice(s![..len, ..]).to_owned()
}

/// Score of a tag path, including the START and END transitions.
pub fn path_score(transitions: ArrayView2<f64>, emissions: ArrayView2<f64>, path: &[usize]) -> f64 {
    let n_tags = transitions.nrows();
    let (start, end) = (n_tags - 2, n_tags - 1);

    let mut score = 0.;
    let mut prev = start;
    for (t, &tag) in path.iter().enumerate() {
        score += transitions[[prev, tag]] + emissions[[t, tag]];
        prev = tag;
    }

    score + transitions[[prev, end]]
}

/// All paths of length `len` over tags `0..n_tags`.
pub fn all_paths(n_tags: usize, len: usize) -> impl Iterator<Item = Vec<usize>> {
    itertools::repeat_n(0..n_tags, len).multi_cartesian_product()
}

/// Log-partition function computed by enumerating every path over
/// every tag.
pub fn brute_force_log_partition(
    transitions: ArrayView2<f64>,
    emissions: ArrayView2<f64>,
) -> f64 {
    let scores = all_paths(transitions.nrows(), emissions.nrows())
        .map(|path| path_score(transitions, emissions, &path))
        .collect::<Vec<_>>();
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    max + scores.iter().map(|score| (score - max).exp()).sum::<f64>().ln()
}

/// Highest-scoring path computed by enumerating every path over
/// every tag.
pub fn brute_force_best_path(
    transitions: ArrayView2<f64>,
    emissions: ArrayView2<f64>,
) -> Vec<usize> {
    all_paths(transitions.nrows(), emissions.nrows())
        .map(|path| (path_score(transitions, emissions, &path), path))
        .max_by(|(score1, _), (score2, _)| score1.partial_cmp(score2).unwrap())
        .map(|(_, path)| path)
        .unwrap()
}
