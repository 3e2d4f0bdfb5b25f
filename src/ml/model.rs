// ============================================================
// Layer 5: Intent Classifier Architecture
// ============================================================
//   token_ids [B, L]
//     → Embedding            [B, L, D]
//     → mean over non-PAD    [B, D]      (word order is dropped)
//     → Linear + ReLU        [B, H]
//     → Dropout
//     → Linear + ReLU        [B, H/2]
//     → Dropout
//     → Linear               [B, C]      logits
//
// The mean divides by the number of real tokens, so padding never
// dilutes a short sentence. An all-padding row pools to zeros.
// Embedding rows start uniform in [-0.05, 0.05].
// Dropout is active only on an autodiff backend, so the same
// module runs deterministically at validation time.
//
// Loss is categorical cross-entropy against one-hot targets:
//   loss = mean_b( -Σ_c target[b,c] * log_softmax(logits)[b,c] )

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{log_softmax, relu, softmax},
};

use crate::data::preprocessor::PAD_ID;

const EMBEDDING_INIT_RANGE: f64 = 0.05;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
#[derive(Config, Debug)]
pub struct IntentClassifierConfig {
    /// Rows in the embedding table (vocabulary entries incl. <PAD>, <OOV>)
    pub vocab_size:          usize,
    pub num_classes:         usize,
    pub max_sequence_length: usize,
    #[config(default = 128)]
    pub embedding_dim:       usize,
    #[config(default = 64)]
    pub hidden_units:        usize,
    #[config(default = 0.3)]
    pub dropout_rate:        f64,
}

impl IntentClassifierConfig {
    /// Width of the second dense layer
    pub fn second_hidden_units(&self) -> usize {
        (self.hidden_units / 2).max(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> IntentClassifier<B> {
        let h2 = self.second_hidden_units();
        IntentClassifier {
            embedding: EmbeddingConfig::new(self.vocab_size, self.embedding_dim)
                .with_initializer(Initializer::Uniform {
                    min: -EMBEDDING_INIT_RANGE,
                    max: EMBEDDING_INIT_RANGE,
                })
                .init(device),
            dense1:    LinearConfig::new(self.embedding_dim, self.hidden_units).init(device),
            dropout1:  DropoutConfig::new(self.dropout_rate).init(),
            dense2:    LinearConfig::new(self.hidden_units, h2).init(device),
            dropout2:  DropoutConfig::new(self.dropout_rate).init(),
            output:    LinearConfig::new(h2, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct IntentClassifier<B: Backend> {
    pub embedding: Embedding<B>,
    pub dense1:    Linear<B>,
    pub dropout1:  Dropout,
    pub dense2:    Linear<B>,
    pub dropout2:  Dropout,
    pub output:    Linear<B>,
}

impl<B: Backend> IntentClassifier<B> {
    /// token_ids: [batch, seq_len] → logits: [batch, num_classes]
    pub fn forward(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = token_ids.dims();

        // 1.0 for real tokens, 0.0 for <PAD>
        let mask   = token_ids.clone().not_equal_elem(PAD_ID as i64).float();
        let counts = mask.clone().sum_dim(1).clamp_min(1.0);

        let x = self.embedding.forward(token_ids);
        let [_, _, dim] = x.dims();
        let x = (x * mask.reshape([batch_size, seq_len, 1]))
            .sum_dim(1)
            .reshape([batch_size, dim])
            / counts;

        let x = self.dropout1.forward(relu(self.dense1.forward(x)));
        let x = self.dropout2.forward(relu(self.dense2.forward(x)));
        self.output.forward(x)
    }

    /// Class probabilities: [batch, num_classes], rows sum to 1.
    pub fn forward_probs(&self, token_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        softmax(self.forward(token_ids), 1)
    }

    /// (loss [1], logits [batch, num_classes])
    pub fn forward_loss(
        &self,
        token_ids: Tensor<B, 2, Int>,
        targets:   Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(token_ids);
        let loss   = categorical_cross_entropy(logits.clone(), targets);
        (loss, logits)
    }
}

pub fn categorical_cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (targets * log_softmax(logits, 1)).sum_dim(1).mean().neg()
}

/// Rows whose argmax matches the one-hot target.
pub fn correct_count<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2>) -> usize {
    let hits: i64 = logits
        .argmax(1)
        .equal(targets.argmax(1))
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    hits as usize
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn ids(rows: Vec<Vec<i64>>) -> Tensor<B, 2, Int> {
        let n = rows.len();
        let l = rows[0].len();
        let flat: Vec<i64> = rows.into_iter().flatten().collect();
        Tensor::from_data(TensorData::new(flat, [n, l]), &Default::default())
    }

    fn floats(values: Vec<f32>, shape: [usize; 2]) -> Tensor<B, 2> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    #[test]
    fn test_forward_shapes_and_probabilities() {
        let device = Default::default();
        let model  = IntentClassifierConfig::new(20, 4, 6)
            .with_embedding_dim(8)
            .with_hidden_units(6)
            .init::<B>(&device);

        let x = ids(vec![vec![2, 3, 0, 0, 0, 0], vec![5, 5, 5, 1, 0, 0], vec![0; 6]]);
        assert_eq!(model.forward(x.clone()).dims(), [3, 4]);

        let probs: Vec<f32> = model.forward_probs(x).into_data().to_vec().unwrap();
        for row in probs.chunks(4) {
            assert!(row.iter().all(|p| p.is_finite()));
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_embedding_starts_small_and_uniform() {
        let model = IntentClassifierConfig::new(50, 3, 4).init::<B>(&Default::default());
        let table: Vec<f32> = model.embedding.weight.val().into_data().to_vec().unwrap();

        assert_eq!(table.len(), 50 * 128);
        assert!(table.iter().all(|w| w.abs() <= 0.05), "embedding init out of range");
        // not collapsed to a constant
        let spread = table.iter().cloned().fold(f32::MIN, f32::max)
            - table.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread > 0.05);
    }

    #[test]
    fn test_padding_does_not_dilute_the_mean() {
        let model = IntentClassifierConfig::new(20, 4, 6)
            .with_embedding_dim(8)
            .with_hidden_units(6)
            .init::<B>(&Default::default());

        let short: Vec<f32> = model.forward(ids(vec![vec![2, 3]])).into_data().to_vec().unwrap();
        let padded: Vec<f32> =
            model.forward(ids(vec![vec![2, 3, 0, 0, 0, 0, 0, 0]])).into_data().to_vec().unwrap();

        for (a, b) in short.iter().zip(&padded) {
            assert!((a - b).abs() < 1e-5, "{short:?} vs {padded:?}");
        }
    }

    #[test]
    fn test_second_layer_is_half_width() {
        let cfg = IntentClassifierConfig::new(10, 3, 4);
        assert_eq!(cfg.embedding_dim, 128);
        assert_eq!(cfg.second_hidden_units(), 32);
        let model = cfg.init::<B>(&Default::default());
        assert_eq!(model.dense2.weight.val().dims(), [64, 32]);
    }

    #[test]
    fn test_cross_entropy_of_uniform_logits_is_ln_c() {
        let logits  = floats(vec![0.0; 8], [2, 4]);
        let targets = floats(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0], [2, 4]);
        let loss: f32 = categorical_cross_entropy(logits, targets).into_scalar();
        assert!((loss - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_correct_count() {
        let logits  = floats(vec![2.0, 1.0, 0.0, 3.0, 5.0, 1.0], [3, 2]);
        let targets = floats(vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0], [3, 2]);
        assert_eq!(correct_count(logits, targets), 2);
    }
}
