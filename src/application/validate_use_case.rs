// ============================================================
// Layer 2: ValidateUseCase
// ============================================================
// Smoke test for exported graphs. For every graph file:
//
//   Step 1: Load the graph and allocate its tensors
//   Step 2: Check the label list matches the output width and
//           the sequence length matches the input width
//   Step 3: For each test sentence:
//             persisted tokenizer → pad → set_input → invoke
//             → argmax → label + confidence
//
// Mispredictions are not errors; the caller prints the results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{dataset::VALIDATION_SENTENCES, preprocessor::pad_sequence};
use crate::domain::{
    label_encoder::LabelEncoder,
    traits::{argmax, IntentPredictor, TokenEncoder},
};
use crate::graph::interpreter::Interpreter;
use crate::infra::{artifact_store::load_labels, tokenizer_store::TokenizerStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    pub tokenizer_path:      PathBuf,
    pub label_encoder_path:  PathBuf,
    pub graph_paths:         Vec<PathBuf>,
    pub max_sequence_length: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            tokenizer_path:      "models/tokenizer.json".into(),
            label_encoder_path:  "models/label_encoder.json".into(),
            graph_paths:         vec![
                "assets/model.tflite".into(),
                "assets/model_quantized.tflite".into(),
            ],
            max_sequence_length: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub text:       String,
    pub label:      String,
    pub confidence: f32,
}

/// Predictions of one graph file.
#[derive(Debug, Clone)]
pub struct GraphReport {
    pub path:        PathBuf,
    pub variant:     &'static str,
    pub predictions: Vec<Prediction>,
}

impl GraphReport {
    pub fn prediction(&self, text: &str) -> Option<&Prediction> {
        self.predictions.iter().find(|p| p.text == text)
    }
}

pub struct ValidateUseCase {
    config: ValidateConfig,
}

impl ValidateUseCase {
    pub fn new(config: ValidateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<GraphReport>> {
        let cfg       = &self.config;
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_path).load()?;
        let labels    = load_labels(&cfg.label_encoder_path)?;

        cfg.graph_paths
            .iter()
            .map(|path| self.validate_graph(path, &tokenizer, &labels))
            .collect()
    }

    fn validate_graph(
        &self,
        path:      &Path,
        tokenizer: &Tokenizer,
        labels:    &LabelEncoder,
    ) -> Result<GraphReport> {
        // ── Step 1: Load + allocate ───────────────────────────────────────────
        let mut interpreter = Interpreter::from_file(path)?;
        interpreter.allocate_tensors()?;

        // ── Step 2: Contract checks ───────────────────────────────────────────
        let input  = interpreter.input_details();
        let output = interpreter.output_details();
        if input.shape[1] != self.config.max_sequence_length {
            anyhow::bail!(
                "Graph '{}' expects sequences of {} tokens, but max_sequence_length is {}",
                path.display(),
                input.shape[1],
                self.config.max_sequence_length
            );
        }
        labels
            .ensure_matches(output.shape[1])
            .with_context(|| format!("Label classes do not fit graph '{}'", path.display()))?;

        tracing::debug!(
            "Graph '{}': input {:?} {}, output {:?} {}",
            path.display(), input.shape, input.dtype, output.shape, output.dtype
        );

        // ── Step 3: Predict each sentence ─────────────────────────────────────
        let predictions = VALIDATION_SENTENCES
            .iter()
            .map(|text| {
                classify(&mut interpreter, tokenizer, labels, text, self.config.max_sequence_length)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GraphReport {
            path:        path.to_path_buf(),
            variant:     interpreter.graph().variant.name(),
            predictions,
        })
    }
}

/// Preprocess one sentence exactly as in training and classify it.
pub fn classify<P, E>(
    predictor: &mut P,
    encoder:   &E,
    labels:    &LabelEncoder,
    text:      &str,
    max_len:   usize,
) -> Result<Prediction>
where
    P: IntentPredictor + ?Sized,
    E: TokenEncoder + ?Sized,
{
    let ids   = pad_sequence(&encoder.token_ids(text)?, max_len);
    let probs = predictor.predict(&ids)?;
    let (index, confidence) = argmax(&probs)
        .ok_or_else(|| anyhow::anyhow!("Model returned no probabilities"))?;

    Ok(Prediction {
        text:  text.to_string(),
        label: labels.decode(index)?.to_string(),
        confidence,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Always answers with a fixed distribution.
    struct Fixed(Vec<f32>);

    impl IntentPredictor for Fixed {
        fn predict(&mut self, token_ids: &[i32]) -> Result<Vec<f32>> {
            assert_eq!(token_ids.len(), 8);
            Ok(self.0.clone())
        }
    }

    struct Words;

    impl TokenEncoder for Words {
        fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
        }
    }

    #[test]
    fn test_classify_decodes_argmax() {
        let labels = LabelEncoder::fit(["greeting", "music", "time"]);
        let mut p  = Fixed(vec![0.1, 0.2, 0.7]);
        let pred   = classify(&mut p, &Words, &labels, "what time is it", 8).unwrap();
        assert_eq!(pred.label, "time");
        assert!((pred.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_classify_rejects_extra_outputs() {
        let labels = LabelEncoder::fit(["a", "b"]);
        let mut p  = Fixed(vec![0.1, 0.1, 0.8]);
        assert!(classify(&mut p, &Words, &labels, "x", 8).is_err());
    }
}
