// ============================================================
// Layer 3: Label Encoder
// ============================================================
// Maps intent strings to contiguous class indices 0..N-1 and back.
//
// Ordering rule: classes are SORTED (byte-wise string order) and
// deduplicated. The sorted list is persisted as the source of
// truth and every consumer indexes into it with the argmax of
// the model output; nobody recomputes it from data.
//
// Example:
//   labels seen:  ["weather", "time", "greeting", "time"]
//   classes:      ["greeting", "time", "weather"]
//   encode("time") = 1,  classes[1] = "time"

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current on-disk version of the persisted label list.
pub const LABEL_ENCODER_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("intent '{0}' was not seen when the label encoder was fitted")]
    Unknown(String),

    #[error("class index {index} is out of range for {num_classes} classes")]
    OutOfRange { index: usize, num_classes: usize },

    #[error("label encoder has no classes")]
    NoClasses,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    #[serde(default = "default_version")]
    pub version: u32,
    pub classes: Vec<String>,
}

fn default_version() -> u32 {
    LABEL_ENCODER_VERSION
}

impl LabelEncoder {
    /// Fit on an iterator of labels: sort and deduplicate.
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        Self { version: LABEL_ENCODER_VERSION, classes }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Index of a label. Classes are sorted, so this is a binary search.
    pub fn encode(&self, label: &str) -> Result<usize, LabelError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| LabelError::Unknown(label.to_string()))
    }

    pub fn decode(&self, index: usize) -> Result<&str, LabelError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(LabelError::OutOfRange { index, num_classes: self.classes.len() })
    }

    /// One-hot vector of length num_classes with a 1.0 at `index`.
    pub fn one_hot(&self, index: usize) -> Result<Vec<f32>, LabelError> {
        if index >= self.classes.len() {
            return Err(LabelError::OutOfRange { index, num_classes: self.classes.len() });
        }
        let mut v = vec![0.0f32; self.classes.len()];
        v[index] = 1.0;
        Ok(v)
    }

    /// Encode a label straight to its one-hot vector.
    pub fn encode_one_hot(&self, label: &str) -> Result<Vec<f32>, LabelError> {
        self.one_hot(self.encode(label)?)
    }

    /// Guard run before any inference: the list must exist and
    /// match the width of the model output.
    pub fn ensure_matches(&self, output_width: usize) -> Result<(), LabelError> {
        if self.classes.is_empty() {
            return Err(LabelError::NoClasses);
        }
        if self.classes.len() != output_width {
            return Err(LabelError::OutOfRange {
                index:       output_width.saturating_sub(1),
                num_classes: self.classes.len(),
            });
        }
        Ok(())
    }
}
