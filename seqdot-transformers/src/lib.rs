//! Building blocks for transformer sequence labelers.
//!
//! The central module is [`crf`], a batched linear-chain conditional
//! random field that computes the negative log-likelihood loss of gold
//! label sequences and Viterbi-decodes the best label sequences of a
//! padded batch.

pub mod crf;

pub mod error;
pub use error::TransformerError;

pub mod layers;

pub mod loss;

pub mod module;

pub mod util;
