//! Label vocabulary.

use std::io::BufRead;

use numberer::Numberer;

use crate::error::SeqDotError;

/// Vocabulary of the labels predicted by a labeler.
///
/// Labels are numbered from zero in the order in which they are
/// added. These numbers are the label indices of the CRF.
pub struct Labels {
    numberer: Numberer<String>,
}

impl Labels {
    /// Read labels from a buffered reader, one label per line.
    ///
    /// Empty lines are skipped.
    pub fn from_buf_read(read: impl BufRead) -> Result<Self, SeqDotError> {
        let mut labels = Vec::new();
        for line in read.lines() {
            let line = line?;
            let label = line.trim();
            if !label.is_empty() {
                labels.push(label.to_owned());
            }
        }

        Self::from_labels(labels)
    }

    /// Construct a vocabulary from labels.
    ///
    /// Returns an error if a label occurs more than once.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, SeqDotError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut numberer = Numberer::new(0);
        for label in labels {
            let label = label.into();
            if numberer.number(&label).is_some() {
                return Err(SeqDotError::DuplicateLabel(label));
            }
            numberer.add(label);
        }

        log::debug!("Label vocabulary has {} labels", numberer.len());

        Ok(Labels { numberer })
    }

    /// Get the number of a label.
    pub fn number(&self, label: &str) -> Option<usize> {
        self.numberer.number(&label.to_owned())
    }

    /// Get the label of a number.
    pub fn label(&self, number: usize) -> Option<&str> {
        self.numberer.value(number).map(String::as_str)
    }

    /// The number of labels.
    pub fn len(&self) -> usize {
        self.numberer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode a label sequence as label numbers.
    pub fn encode<S>(&self, labels: &[S]) -> Result<Vec<i64>, SeqDotError>
    where
        S: AsRef<str>,
    {
        labels
            .iter()
            .map(|label| {
                self.number(label.as_ref())
                    .map(|number| number as i64)
                    .ok_or_else(|| SeqDotError::UnknownLabel(label.as_ref().to_owned()))
            })
            .collect()
    }

    /// Decode a sequence of label numbers.
    pub fn decode(&self, numbers: &[i64]) -> Result<Vec<String>, SeqDotError> {
        numbers
            .iter()
            .map(|&number| {
                if number < 0 {
                    return Err(SeqDotError::UnknownLabelNumber(number));
                }

                self.label(number as usize)
                    .map(ToOwned::to_owned)
                    .ok_or(SeqDotError::UnknownLabelNumber(number))
            })
            .collect()
    }
}
