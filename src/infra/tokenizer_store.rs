// ============================================================
// Layer 6: Tokenizer Store
// ============================================================
// Persists the fitted Vocabulary as a HuggingFace `tokenizers`
// JSON file and loads it back as a tokenizers::Tokenizer. The
// persisted file is the only text → id mapping used after fitting.
//
// The pipeline is configured to reproduce preprocessor::tokenize
// exactly:
//   normalizer:    Replace(filter chars → " ") then Lowercase
//   pre_tokenizer: WhitespaceSplit
//   model:         WordLevel, unk_token = <OOV>
//
// <PAD> and <OOV> live only in the WordLevel vocab. They are not
// registered as added tokens, so a literal "<PAD>" in the input is
// normalized like any other text ("pad"), as tokenize does.
//
// As in tokenizers 0.15, the JSON is written by hand and read
// back with Tokenizer::from_file instead of going through a
// trainer.

use std::path::PathBuf;

use anyhow::Result;
use tokenizers::Tokenizer;

use crate::data::preprocessor::{Vocabulary, PAD_TOKEN};
use crate::domain::{
    metadata::{TokenizerConfig, DEFAULT_FILTERS},
    traits::TokenEncoder,
};
use crate::infra::artifact_store::write_atomic;

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load a previously saved tokenizer from JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        Tokenizer::from_file(&self.path).map_err(|e| {
            anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}. Have you run 'train' first?",
                self.path.display(),
                e
            )
        })
    }

    /// Write the vocabulary as tokenizer JSON and load it back.
    pub fn save(&self, vocabulary: &Vocabulary) -> Result<Tokenizer> {
        let json = tokenizer_json(vocabulary);
        write_atomic(&self.path, serde_json::to_string_pretty(&json)?.as_bytes())?;

        tracing::info!(
            "Tokenizer saved with {} entries to '{}'",
            vocabulary.len(),
            self.path.display()
        );
        self.load()
    }
}

/// Regex character class matching any filter character.
fn filter_pattern() -> String {
    let mut class = String::from("[");
    for c in DEFAULT_FILTERS.chars() {
        match c {
            '\\' | ']' | '[' | '^' | '-' | '&' => {
                class.push('\\');
                class.push(c);
            }
            '\t' => class.push_str("\\t"),
            '\n' => class.push_str("\\n"),
            _ => class.push(c),
        }
    }
    class.push(']');
    class
}

fn tokenizer_json(vocabulary: &Vocabulary) -> serde_json::Value {
    let vocab: serde_json::Map<String, serde_json::Value> = vocabulary
        .entries()
        .map(|(token, id)| (token.to_string(), serde_json::json!(id)))
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": {
            "type": "Sequence",
            "normalizers": [
                { "type": "Replace", "pattern": { "Regex": filter_pattern() }, "content": " " },
                { "type": "Lowercase" }
            ]
        },
        "pre_tokenizer": { "type": "WhitespaceSplit" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": vocabulary.oov_token()
        }
    })
}

impl TokenEncoder for Tokenizer {
    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }
}

/// The preprocessing record written into the model metadata.
pub fn tokenizer_config(tokenizer: &Tokenizer, num_words: usize, oov_token: &str) -> TokenizerConfig {
    TokenizerConfig {
        num_words,
        filters:    DEFAULT_FILTERS.to_string(),
        lower:      true,
        split:      " ".to_string(),
        char_level: false,
        oov_token:  oov_token.to_string(),
        pad_token:  PAD_TOKEN.to_string(),
        word_index: tokenizer.get_vocab(true).into_iter().collect(),
    }
}
