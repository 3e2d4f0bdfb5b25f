// ============================================================
// Layer 5: Model → Portable Graph
// ============================================================
// Reads the learned parameters out of the burn module and lays
// them out as a Float32 graph. Nothing is approximated: every
// value is copied as f32, so the graph computes exactly what
// forward_probs() computes (up to float summation order).
//
//   embedding.weight  [V, D]      → Embedding { table }
//   (mean over non-PAD ids)       → MeanPool
//   dense1  [D, H]  + bias [H]    → FullyConnected + Relu
//   dense2  [H, H2] + bias [H2]   → FullyConnected + Relu
//   output  [H2, C] + bias [C]    → FullyConnected
//   (softmax)                     → Softmax
//
// burn stores Linear weights as [d_input, d_output], which is
// already the row-major layout the graph expects.

use anyhow::Result;
use burn::{nn::Linear, prelude::*};

use crate::graph::{Activation, ConstTensor, Graph, Node, Op, Variant};
use crate::ml::model::IntentClassifier;

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<ConstTensor> {
    let shape  = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor values: {e:?}"))?;
    Ok(ConstTensor::f32(shape, values))
}

fn dense_node<B: Backend>(linear: &Linear<B>, activation: Activation) -> Result<Node> {
    let weights = tensor_values(linear.weight.val())?;
    let out_dim = weights.shape[1];
    let bias = match &linear.bias {
        Some(bias) => tensor_values(bias.val())?,
        None => ConstTensor::f32(vec![out_dim], vec![0.0; out_dim]),
    };
    Ok(Node::float(Op::FullyConnected { weights, bias, activation }))
}

/// Convert a trained classifier into a Float32 graph taking
/// `max_sequence_length` token ids.
pub fn to_float_graph<B: Backend>(
    model:               &IntentClassifier<B>,
    max_sequence_length: usize,
) -> Result<Graph> {
    let table  = tensor_values(model.embedding.weight.val())?;
    let output = dense_node(&model.output, Activation::None)?;
    let num_classes = match &output.op {
        Op::FullyConnected { weights, .. } => weights.shape[1],
        _ => 0,
    };

    let graph = Graph {
        variant:   Variant::Float32,
        input_len: max_sequence_length,
        num_classes,
        nodes: vec![
            Node::float(Op::Embedding { table }),
            Node::float(Op::MeanPool),
            dense_node(&model.dense1, Activation::Relu)?,
            dense_node(&model.dense2, Activation::Relu)?,
            output,
            Node::float(Op::Softmax),
        ],
    };
    graph.check()?;

    tracing::debug!(
        "Converted model: vocab={:?}, classes={}, input_len={}",
        graph.vocab_size(),
        graph.num_classes,
        graph.input_len
    );
    Ok(graph)
}
