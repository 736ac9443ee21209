use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SeqDotError;
use crate::labels::Labels;
use crate::model::LabelerConfig;

/// Labeler output layer.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub enum LabelerHead {
    /// Linear-chain CRF over the label sequence.
    Crf,

    /// Independent softmax classification of every token.
    Softmax {
        /// Probability mass that is distributed over incorrect labels.
        #[serde(default)]
        label_smoothing: Option<f64>,
    },
}

impl Default for LabelerHead {
    fn default() -> Self {
        LabelerHead::Crf
    }
}

/// Labeler configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Labeler {
    /// The labels file.
    pub labels: String,

    /// The output layer.
    #[serde(default)]
    pub head: LabelerHead,
}

/// Model configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Model {
    /// Model parameters.
    pub parameters: String,

    /// Size of the encoder hidden states.
    pub hidden_size: i64,

    /// Dropout probability of the hidden states.
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

fn default_dropout() -> f64 {
    0.1
}

/// Sequence labeler configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Configuration of the labeler.
    pub labeler: Labeler,

    /// Configuration of the model.
    pub model: Model,
}

impl Config {
    /// Get the labeler configuration for the given number of labels.
    pub fn labeler_config(&self, n_labels: i64) -> Result<LabelerConfig, SeqDotError> {
        let config = LabelerConfig {
            dropout: self.model.dropout,
            head: self.labeler.head,
            hidden_size: self.model.hidden_size,
            n_labels,
        };
        config.validate()?;

        Ok(config)
    }

    /// Read the labels file.
    pub fn labels(&self) -> Result<Labels, SeqDotError> {
        let reader = BufReader::new(File::open(&self.labeler.labels)?);
        Labels::from_buf_read(reader)
    }

    /// Make configuration paths relative to the configuration file.
    pub fn relativize_paths<P>(&mut self, config_path: P) -> Result<(), SeqDotError>
    where
        P: AsRef<Path>,
    {
        let config_path = config_path.as_ref();

        self.labeler.labels = relativize_path(config_path, &self.labeler.labels)?;
        self.model.parameters = relativize_path(config_path, &self.model.parameters)?;

        Ok(())
    }
}

pub trait TomlRead
where
    Self: Sized,
{
    fn from_toml_read(read: impl Read) -> Result<Self, SeqDotError>;
}

impl TomlRead for Config {
    fn from_toml_read(mut read: impl Read) -> Result<Self, SeqDotError> {
        let mut data = String::new();
        read.read_to_string(&mut data)?;
        let config: Config = toml::from_str(&data)?;

        log::debug!(
            "Read labeler configuration, labels: {}, head: {:?}",
            config.labeler.labels,
            config.labeler.head
        );

        Ok(config)
    }
}

fn relativize_path(config_path: &Path, filename: &str) -> Result<String, SeqDotError> {
    if filename.is_empty() {
        return Ok(filename.to_owned());
    }

    let path = Path::new(&filename);

    // Don't touch absolute paths.
    if path.is_absolute() {
        return Ok(filename.to_owned());
    }

    let abs_config_path = config_path.canonicalize()?;
    Ok(abs_config_path
        .parent()
        .ok_or_else(|| {
            SeqDotError::RelativizePath(format!(
                "Cannot get parent path of the configuration file: {}",
                abs_config_path.to_string_lossy()
            ))
        })?
        .join(path)
        .to_str()
        .ok_or_else(|| {
            SeqDotError::RelativizePath(format!(
                "Cannot convert parent path to string: {}",
                abs_config_path.to_string_lossy()
            ))
        })?
        .to_owned())
}
