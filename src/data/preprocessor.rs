// ============================================================
// Layer 4: Text Preprocessor
// ============================================================
// Turns labelled utterances into model-ready numbers.
//
// Steps:
//   1. Tokenise: lowercase, replace filter characters with a
//      space, split on whitespace. The apostrophe is NOT a filter
//      character, so "what's" stays one token.
//   2. Fit a vocabulary: count tokens over the corpus and rank
//      them by frequency (ties keep first-seen order).
//        id 0 → <PAD>
//        id 1 → <OOV>
//        id 2.. → words by rank
//      The total entry count never exceeds max_vocab_size.
//   3. Convert: token ids, then pad/truncate to exactly
//      max_sequence_length, both on the "post" side.
//   4. Encode labels to one-hot vectors.
//
// Example with max_sequence_length = 6:
//   "What time is it?" → [what, time, is, it] → [4, 9, 7, 8, 0, 0]

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::dataset::EncodedExample;
use crate::domain::{
    example::Example,
    label_encoder::LabelEncoder,
    metadata::DEFAULT_FILTERS,
    traits::TokenEncoder,
};

pub const PAD_TOKEN: &str = "<PAD>";
pub const DEFAULT_OOV_TOKEN: &str = "<OOV>";
pub const PAD_ID: u32 = 0;
pub const OOV_ID: u32 = 1;

/// Lowercase, strip filter characters, split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if DEFAULT_FILTERS.contains(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Truncate or pad `ids` to exactly `max_len`, both at the end.
pub fn pad_sequence(ids: &[u32], max_len: usize) -> Vec<i32> {
    let mut out: Vec<i32> = ids.iter().take(max_len).map(|&id| id as i32).collect();
    out.resize(max_len, PAD_ID as i32);
    out
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// tokens[id] is the token with that id
    tokens:    Vec<String>,
    index:     HashMap<String, u32>,
    oov_token: String,
}

impl Vocabulary {
    /// Fit on a corpus. Ranks by descending frequency; a stable
    /// sort keeps first-seen order between equal counts.
    ///
    /// Fails when `max_size` leaves no room for <PAD> and <OOV>.
    pub fn fit<'a, I>(texts: I, max_size: usize, oov_token: &str) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if max_size < 2 {
            anyhow::bail!(
                "max_vocab_size must be at least 2 to hold {} and {}, got {}",
                PAD_TOKEN,
                oov_token,
                max_size
            );
        }

        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut position: HashMap<String, usize> = HashMap::new();

        for text in texts {
            for token in tokenize(text) {
                match position.get(&token) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        position.insert(token.clone(), counts.len());
                        counts.push((token, 1));
                    }
                }
            }
        }

        counts.sort_by(|a, b| b.1.cmp(&a.1));

        // Two slots are taken by <PAD> and <OOV>
        let max_words = max_size - 2;

        let mut tokens = vec![PAD_TOKEN.to_string(), oov_token.to_string()];
        tokens.extend(
            counts
                .into_iter()
                .map(|(token, _)| token)
                .filter(|t| t != oov_token && t != PAD_TOKEN)
                .take(max_words),
        );

        Ok(Self::from_tokens(tokens, oov_token))
    }

    /// Rebuild from an id-ordered token list.
    fn from_tokens(tokens: Vec<String>, oov_token: &str) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { tokens, index, oov_token: oov_token.to_string() }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn oov_token(&self) -> &str {
        &self.oov_token
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    /// (token, id) pairs in id order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tokens.iter().enumerate().map(|(i, t)| (t.as_str(), i as u32))
    }
}

impl TokenEncoder for Vocabulary {
    fn token_ids(&self, text: &str) -> Result<Vec<u32>> {
        Ok(tokenize(text)
            .iter()
            .map(|t| self.id(t).unwrap_or(OOV_ID))
            .collect())
    }
}

// ─── Preprocessor ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub max_vocab_size:      usize,
    pub max_sequence_length: usize,
    pub oov_token:           String,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_vocab_size:      10_000,
            max_sequence_length: 32,
            oov_token:           DEFAULT_OOV_TOKEN.to_string(),
        }
    }
}

pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn max_sequence_length(&self) -> usize {
        self.config.max_sequence_length
    }

    /// Fit the vocabulary and the label encoder on the examples.
    pub fn fit(&self, examples: &[Example]) -> Result<(Vocabulary, LabelEncoder)> {
        let vocabulary = Vocabulary::fit(
            examples.iter().map(|e| e.text.as_str()),
            self.config.max_vocab_size,
            &self.config.oov_token,
        )?;
        let labels = LabelEncoder::fit(examples.iter().map(|e| e.intent.as_str()));

        tracing::info!(
            "Fitted vocabulary ({} entries) and {} intent classes",
            vocabulary.len(),
            labels.num_classes()
        );
        Ok((vocabulary, labels))
    }

    /// Text → padded sequence of length max_sequence_length.
    pub fn to_sequence<E>(&self, encoder: &E, text: &str) -> Result<Vec<i32>>
    where
        E: TokenEncoder + ?Sized,
    {
        let ids = encoder.token_ids(text)?;
        Ok(pad_sequence(&ids, self.config.max_sequence_length))
    }

    /// Convert every example to (padded ids, one-hot label).
    /// Fails on a label the encoder has never seen.
    pub fn encode_examples<E>(
        &self,
        examples: &[Example],
        encoder:  &E,
        labels:   &LabelEncoder,
    ) -> Result<Vec<EncodedExample>>
    where
        E: TokenEncoder + ?Sized,
    {
        examples
            .iter()
            .map(|ex| {
                Ok(EncodedExample {
                    token_ids: self.to_sequence(encoder, &ex.text)?,
                    one_hot:   labels.encode_one_hot(&ex.intent)?,
                })
            })
            .collect()
    }

    /// Fit on `examples` and encode them with the fresh vocabulary.
    pub fn prepare(&self, examples: &[Example]) -> Result<PreparedData> {
        let (vocabulary, labels) = self.fit(examples)?;
        let encoded = self.encode_examples(examples, &vocabulary, &labels)?;
        Ok(PreparedData { encoded, vocabulary, labels })
    }
}

/// Output of [`Preprocessor::prepare`]: one encoded row per example,
/// in input order, plus the fitted mappings.
pub struct PreparedData {
    pub encoded:    Vec<EncodedExample>,
    pub vocabulary: Vocabulary,
    pub labels:     LabelEncoder,
}

impl PreparedData {
    pub fn sequences(&self) -> impl Iterator<Item = &[i32]> {
        self.encoded.iter().map(|e| e.token_ids.as_slice())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(tokenize("What's the Weather, today?"), vec!["what's", "the", "weather", "today"]);
        assert_eq!(tokenize("  \t!!  "), Vec::<String>::new());
    }

    #[test]
    fn test_ids_rank_by_frequency_then_first_seen() {
        let vocab = Vocabulary::fit(["b a", "a c", "c d"], 100, DEFAULT_OOV_TOKEN).unwrap();
        // counts: a=2, c=2, b=1, d=1; a seen before c, b before d
        assert_eq!(vocab.id(PAD_TOKEN), Some(0));
        assert_eq!(vocab.id(DEFAULT_OOV_TOKEN), Some(1));
        assert_eq!(vocab.id("a"), Some(2));
        assert_eq!(vocab.id("c"), Some(3));
        assert_eq!(vocab.id("b"), Some(4));
        assert_eq!(vocab.id("d"), Some(5));
    }

    #[test]
    fn test_vocabulary_size_is_capped() {
        let texts = ["one two three four five six seven eight nine ten"];
        for cap in [2, 3, 5, 100] {
            let vocab = Vocabulary::fit(texts, cap, DEFAULT_OOV_TOKEN).unwrap();
            assert!(vocab.len() <= cap, "cap {cap} gave {}", vocab.len());
        }
        assert_eq!(Vocabulary::fit(texts, 2, DEFAULT_OOV_TOKEN).unwrap().len(), 2);
    }

    #[test]
    fn test_cap_without_room_for_specials_is_rejected() {
        for cap in [0, 1] {
            let err = Vocabulary::fit(["a b c"], cap, DEFAULT_OOV_TOKEN).unwrap_err();
            assert!(err.to_string().contains("at least 2"), "{err}");
        }
    }

    #[test]
    fn test_unknown_and_capped_tokens_map_to_oov() {
        let vocab = Vocabulary::fit(["a a a b"], 3, DEFAULT_OOV_TOKEN).unwrap();
        assert_eq!(vocab.token_ids("a b zebra").unwrap(), vec![2, OOV_ID, OOV_ID]);
    }

    #[test]
    fn test_padded_length_is_always_max_len() {
        for n in [0usize, 1, 5, 31, 32, 33, 100] {
            let ids: Vec<u32> = (1..=n as u32).collect();
            assert_eq!(pad_sequence(&ids, 32).len(), 32);
        }
    }

    #[test]
    fn test_padding_and_truncation_are_post() {
        assert_eq!(pad_sequence(&[5, 6], 4), vec![5, 6, 0, 0]);
        assert_eq!(pad_sequence(&[1, 2, 3, 4, 5], 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_padding_is_idempotent() {
        let once: Vec<u32> = pad_sequence(&[3, 4, 5], 6).iter().map(|&v| v as u32).collect();
        let twice = pad_sequence(&once, 6);
        assert_eq!(twice, pad_sequence(&[3, 4, 5], 6));
    }

    #[test]
    fn test_encode_examples_rejects_unseen_label() {
        let prep     = Preprocessor::new(PreprocessConfig::default());
        let train    = vec![Example::new("hi", "greeting"), Example::new("play", "music")];
        let (vocab, labels) = prep.fit(&train).unwrap();

        let ok = prep.encode_examples(&train, &vocab, &labels).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].one_hot, vec![0.0, 1.0]);
        assert_eq!(ok[0].token_ids.len(), 32);

        let unseen = vec![Example::new("hello", "weather")];
        assert!(prep.encode_examples(&unseen, &vocab, &labels).is_err());
    }

    #[test]
    fn test_prepare_keeps_example_order() {
        let prep = Preprocessor::new(PreprocessConfig { max_sequence_length: 4, ..Default::default() });
        let examples = vec![
            Example::new("play music", "music"),
            Example::new("hello", "greeting"),
        ];
        let data = prep.prepare(&examples).unwrap();

        assert_eq!(data.encoded.len(), 2);
        assert_eq!(data.labels.classes, vec!["greeting", "music"]);
        assert_eq!(data.encoded[0].class_index(), 1);
        assert_eq!(data.encoded[1].class_index(), 0);

        let first: Vec<i32> = data.sequences().next().unwrap().to_vec();
        assert_eq!(first, vec![2, 3, 0, 0]);
    }
}
