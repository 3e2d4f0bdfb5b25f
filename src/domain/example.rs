// ============================================================
// Layer 3: Example Domain Type
// ============================================================
// One labelled utterance: the raw text a user typed and the
// intent it belongs to. Intents are free-form strings; the
// closed set of classes is derived at runtime by the
// LabelEncoder from whatever labels the dataset contains.
//
// This module also owns dataset validation, because the rules
// are pure functions of the examples themselves:
//   - the dataset must not be empty
//   - no example may have an empty text or intent
//   - at least two distinct intents must be present
//   - every intent needs at least two examples, otherwise a
//     train/validation split cannot place it meaningfully

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A labelled training utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// The utterance as the user would type or say it
    pub text: String,

    /// The intent label, e.g. "weather" or "time"
    pub intent: String,
}

impl Example {
    pub fn new(text: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            text:   text.into(),
            intent: intent.into(),
        }
    }
}

/// Reasons a dataset is rejected before training starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("dataset is empty")]
    Empty,

    #[error("example {index} has an empty text")]
    EmptyText { index: usize },

    #[error("example {index} has an empty intent")]
    EmptyIntent { index: usize },

    #[error("dataset has {found} distinct intent(s); at least 2 are required")]
    TooFewIntents { found: usize },

    #[error("intent '{intent}' has {count} example(s); at least 2 are required")]
    TooFewExamples { intent: String, count: usize },
}

/// Count examples per intent, keyed in sorted order.
pub fn intent_counts(examples: &[Example]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for ex in examples {
        *counts.entry(ex.intent.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Check every dataset rule, returning the first violation found.
pub fn validate_examples(examples: &[Example]) -> Result<(), DatasetError> {
    if examples.is_empty() {
        return Err(DatasetError::Empty);
    }

    for (index, ex) in examples.iter().enumerate() {
        if ex.text.trim().is_empty() {
            return Err(DatasetError::EmptyText { index });
        }
        if ex.intent.trim().is_empty() {
            return Err(DatasetError::EmptyIntent { index });
        }
    }

    let counts = intent_counts(examples);
    if counts.len() < 2 {
        return Err(DatasetError::TooFewIntents { found: counts.len() });
    }

    if let Some((intent, count)) = counts.iter().find(|(_, count)| **count < 2) {
        return Err(DatasetError::TooFewExamples {
            intent: intent.to_string(),
            count:  *count,
        });
    }

    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Vec<Example> {
        vec![
            Example::new("hello", "greeting"),
            Example::new("hi there", "greeting"),
            Example::new("what time is it", "time"),
            Example::new("current time please", "time"),
        ]
    }

    #[test]
    fn test_valid_dataset_passes() {
        assert_eq!(validate_examples(&two_by_two()), Ok(()));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        assert_eq!(validate_examples(&[]), Err(DatasetError::Empty));
    }

    #[test]
    fn test_single_intent_rejected() {
        let data = vec![Example::new("hello", "greeting"), Example::new("hi", "greeting")];
        assert_eq!(
            validate_examples(&data),
            Err(DatasetError::TooFewIntents { found: 1 })
        );
    }

    #[test]
    fn test_blank_text_rejected() {
        let mut data = two_by_two();
        data[2].text = "   ".to_string();
        assert_eq!(validate_examples(&data), Err(DatasetError::EmptyText { index: 2 }));
    }

    #[test]
    fn test_singleton_intent_rejected() {
        let mut data = two_by_two();
        data.push(Example::new("play a song", "music"));
        assert_eq!(
            validate_examples(&data),
            Err(DatasetError::TooFewExamples { intent: "music".into(), count: 1 })
        );
    }
}
