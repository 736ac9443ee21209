use std::io;

use seqdot_transformers::crf::CrfError;
use seqdot_transformers::TransformerError;
use tch::TchError;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SeqDotError {
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Illegal configuration: {0}")]
    IllegalConfiguration(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Cannot relativize path: {0}")]
    RelativizePath(String),

    #[error(transparent)]
    Tch(#[from] TchError),

    #[error(transparent)]
    TomlDeserialization(#[from] toml::de::Error),

    #[error(transparent)]
    Transformer(#[from] TransformerError),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Unknown label number: {0}")]
    UnknownLabelNumber(i64),
}

impl From<CrfError> for SeqDotError {
    fn from(err: CrfError) -> Self {
        SeqDotError::Transformer(err.into())
    }
}
