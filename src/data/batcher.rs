// ============================================================
// Layer 4: Intent Batcher
// ============================================================
// Stacks a slice of EncodedExamples into the two tensors one
// training step needs.
//
//   Input:  N examples, each with L token ids and C targets
//   Output: token_ids [N, L] (Int), targets [N, C] (Float)
//
// Every sequence is already padded to the same length, so the
// flat Vec can be reshaped directly:
//   [s1_t1, ..., s1_tL, s2_t1, ..., sN_tL] → [N, L]

use burn::{prelude::*, tensor::TensorData};

use crate::data::dataset::EncodedExample;

#[derive(Debug, Clone)]
pub struct IntentBatch<B: Backend> {
    /// Padded token ids: [batch_size, max_sequence_length]
    pub token_ids: Tensor<B, 2, Int>,

    /// One-hot targets: [batch_size, num_classes]
    pub targets: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct IntentBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> IntentBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack `items` into one batch. `items` must not be empty.
    pub fn batch(&self, items: &[&EncodedExample]) -> IntentBatch<B> {
        let batch_size  = items.len();
        let seq_len     = items.first().map_or(0, |s| s.token_ids.len());
        let num_classes = items.first().map_or(0, |s| s.one_hot.len());

        let ids_flat: Vec<i64> = items
            .iter()
            .flat_map(|s| s.token_ids.iter().map(|&x| x as i64))
            .collect();

        let targets_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.one_hot.iter().copied())
            .collect();

        let token_ids = Tensor::<B, 2, Int>::from_data(
            TensorData::new(ids_flat, [batch_size, seq_len]),
            &self.device,
        );

        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(targets_flat, [batch_size, num_classes]),
            &self.device,
        );

        IntentBatch { token_ids, targets }
    }
}
