// ============================================================
// Layer 3: Model Metadata
// ============================================================
// The JSON sidecar written next to the exported graphs. A mobile
// client reads it to learn:
//   - the input/output tensor shapes
//   - how to map an output index to an intent name
//   - exactly how to turn text into token ids (tokenizer config,
//     padding and truncation side, sequence length)
//
// If the client preprocesses differently from training, every
// prediction is silently wrong, so this record must be complete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MODEL_NAME: &str = "Intent Classification Model";
pub const MODEL_VERSION: &str = "1.0.0";

/// Characters replaced by a space before splitting on whitespace.
pub const DEFAULT_FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// How text is converted to token ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Upper bound on vocabulary entries, padding and OOV included
    pub num_words:  usize,
    pub filters:    String,
    pub lower:      bool,
    pub split:      String,
    pub char_level: bool,
    pub oov_token:  String,
    pub pad_token:  String,
    /// Token -> id; id 0 is padding, id 1 is OOV
    pub word_index: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub tokenizer_config: TokenizerConfig,
    /// "post": padding zeros are appended after the tokens
    pub padding:    String,
    /// "post": overlong inputs lose their trailing tokens
    pub truncating: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name:          String,
    pub model_version:       String,
    pub input_shape:         [usize; 2],
    pub output_shape:        [usize; 2],
    pub class_names:         Vec<String>,
    pub max_sequence_length: usize,
    pub vocab_size:          usize,
    /// Variant stored at the quantized path ("full_integer" or "dynamic_range")
    pub quantization:        String,
    pub preprocessing:       Preprocessing,
}

impl ModelMetadata {
    pub fn new(
        class_names:         Vec<String>,
        max_sequence_length: usize,
        vocab_size:          usize,
        quantization:        impl Into<String>,
        tokenizer_config:    TokenizerConfig,
    ) -> Self {
        Self {
            model_name:    MODEL_NAME.to_string(),
            model_version: MODEL_VERSION.to_string(),
            input_shape:   [1, max_sequence_length],
            output_shape:  [1, class_names.len()],
            class_names,
            max_sequence_length,
            vocab_size,
            quantization:  quantization.into(),
            preprocessing: Preprocessing {
                tokenizer_config,
                padding:    "post".to_string(),
                truncating: "post".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_follow_inputs() {
        let cfg = TokenizerConfig {
            num_words:  100,
            filters:    DEFAULT_FILTERS.to_string(),
            lower:      true,
            split:      " ".to_string(),
            char_level: false,
            oov_token:  "<OOV>".to_string(),
            pad_token:  "<PAD>".to_string(),
            word_index: BTreeMap::new(),
        };
        let meta = ModelMetadata::new(
            vec!["a".into(), "b".into(), "c".into()],
            32, 57, "full_integer", cfg,
        );
        assert_eq!(meta.input_shape, [1, 32]);
        assert_eq!(meta.output_shape, [1, 3]);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["preprocessing"]["padding"], "post");
        assert_eq!(json["class_names"][2], "c");
    }
}
