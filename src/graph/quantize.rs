// ============================================================
// Layer 7: Graph Quantization
// ============================================================
// Float32 graph → int8 graph, two ways:
//
//   quantize_full_integer(graph, calibration)
//     1. Run the float graph on every calibration sequence and
//        record the min/max of each node's output.
//     2. Weights: symmetric int8, scale = max|w| / 127.
//        Embedding table: asymmetric int8 over its own range
//        (its rows ARE the first activation).
//        Biases: int32 in the accumulator scale (x_scale * w_scale).
//     3. Activations: asymmetric int8 over the observed range,
//        widened to include 0 so padding and relu stay exact.
//        Softmax output is fixed at SOFTMAX_OUTPUT_QUANT.
//
//   quantize_dynamic_range(graph)
//     Weights and table to symmetric int8, biases stay f32, no
//     activation quantization. Needs no calibration data, so it
//     is the fallback when full-integer conversion fails.

use thiserror::Error;

use super::{
    interpreter::Interpreter,
    kernels::SOFTMAX_OUTPUT_QUANT,
    ConstTensor, Graph, GraphError, Node, Op, QuantParams, TensorData, Variant,
};

#[derive(Debug, Error)]
pub enum QuantizeError {
    #[error("representative dataset is empty; cannot calibrate activation ranges")]
    EmptyCalibrationSet,

    #[error("only float32 graphs can be quantized, got {0}")]
    NotFloatGraph(&'static str),

    #[error("node {node} produced a non-finite activation during calibration")]
    NonFiniteActivation { node: usize },

    #[error("calibration run failed: {0}")]
    Calibration(#[from] GraphError),
}

// ─── Parameter selection ──────────────────────────────────────────────────────

/// Asymmetric params covering [min, max] ∪ {0}.
fn activation_params(min: f32, max: f32) -> QuantParams {
    let min = min.min(0.0);
    let max = max.max(0.0);
    let range = max - min;
    let scale = if range > f32::EPSILON { range / 255.0 } else { 1.0 / 255.0 };
    let zero_point = (-128.0 - min / scale).round().clamp(-128.0, 127.0) as i32;
    QuantParams { scale, zero_point }
}

/// Symmetric params for weights: zero point 0, ±127.
fn weight_params(values: &[f32]) -> QuantParams {
    let max_abs = values.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    let scale = if max_abs > 0.0 { max_abs / 127.0 } else { 1.0 };
    QuantParams { scale, zero_point: 0 }
}

fn quantize_tensor(shape: &[usize], values: &[f32], quant: QuantParams) -> ConstTensor {
    ConstTensor {
        shape: shape.to_vec(),
        data:  TensorData::I8 {
            values: values.iter().map(|&v| quant.quantize(v)).collect(),
            quant,
        },
    }
}

fn ensure_float(graph: &Graph) -> Result<(), QuantizeError> {
    match graph.variant {
        Variant::Float32 => Ok(()),
        other => Err(QuantizeError::NotFloatGraph(other.name())),
    }
}

// ─── Full integer ─────────────────────────────────────────────────────────────

/// Per-node output ranges over the calibration set.
fn calibrate(graph: &Graph, calibration: &[Vec<i32>]) -> Result<Vec<(f32, f32)>, QuantizeError> {
    let mut interpreter = Interpreter::new(graph.clone());
    interpreter.allocate_tensors()?;

    let mut ranges = vec![(0.0f32, 0.0f32); graph.nodes.len()];
    let mut bad_node: Option<usize> = None;

    for ids in calibration {
        interpreter.observe(ids, &mut |i: usize, out: &[f32]| {
            for &v in out {
                if !v.is_finite() {
                    bad_node.get_or_insert(i);
                    continue;
                }
                ranges[i].0 = ranges[i].0.min(v);
                ranges[i].1 = ranges[i].1.max(v);
            }
        })?;
    }

    match bad_node {
        Some(node) => Err(QuantizeError::NonFiniteActivation { node }),
        None => Ok(ranges),
    }
}

pub fn quantize_full_integer(
    graph:       &Graph,
    calibration: &[Vec<i32>],
) -> Result<Graph, QuantizeError> {
    ensure_float(graph)?;
    if calibration.is_empty() {
        return Err(QuantizeError::EmptyCalibrationSet);
    }

    let ranges = calibrate(graph, calibration)?;
    tracing::debug!("Calibrated {} node ranges on {} inputs", ranges.len(), calibration.len());

    let mut nodes = Vec::with_capacity(graph.nodes.len());
    // Quantization of the activation flowing into the next node
    let mut incoming = QuantParams { scale: 1.0, zero_point: 0 };

    for (node, &(min, max)) in graph.nodes.iter().zip(&ranges) {
        let (op, out) = match &node.op {
            Op::Embedding { table } => {
                let values = table.to_f32();
                let (lo, hi) = values
                    .iter()
                    .fold((0.0f32, 0.0f32), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                let quant = activation_params(lo, hi);
                (Op::Embedding { table: quantize_tensor(&table.shape, &values, quant) }, quant)
            }
            Op::MeanPool => (Op::MeanPool, activation_params(min, max)),
            Op::FullyConnected { weights, bias, activation } => {
                let w       = weights.to_f32();
                let w_quant = weight_params(&w);
                let acc_scale = incoming.scale as f64 * w_quant.scale as f64;
                let bias_q: Vec<i32> = bias
                    .to_f32()
                    .iter()
                    .map(|&b| (b as f64 / acc_scale).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
                    .collect();
                let op = Op::FullyConnected {
                    weights:    quantize_tensor(&weights.shape, &w, w_quant),
                    bias:       ConstTensor { shape: bias.shape.clone(), data: TensorData::I32(bias_q) },
                    activation: *activation,
                };
                (op, activation_params(min, max))
            }
            Op::Softmax => (Op::Softmax, SOFTMAX_OUTPUT_QUANT),
        };
        incoming = out;
        nodes.push(Node { op, output_quant: Some(out) });
    }

    let quantized = Graph {
        variant:     Variant::FullInteger,
        input_len:   graph.input_len,
        num_classes: graph.num_classes,
        nodes,
    };
    quantized.check()?;
    Ok(quantized)
}

// ─── Dynamic range ────────────────────────────────────────────────────────────

pub fn quantize_dynamic_range(graph: &Graph) -> Result<Graph, QuantizeError> {
    ensure_float(graph)?;

    let nodes = graph
        .nodes
        .iter()
        .map(|node| {
            let op = match &node.op {
                Op::Embedding { table } => {
                    let values = table.to_f32();
                    Op::Embedding { table: quantize_tensor(&table.shape, &values, weight_params(&values)) }
                }
                Op::FullyConnected { weights, bias, activation } => {
                    let w = weights.to_f32();
                    Op::FullyConnected {
                        weights:    quantize_tensor(&weights.shape, &w, weight_params(&w)),
                        bias:       bias.clone(),
                        activation: *activation,
                    }
                }
                other => other.clone(),
            };
            Node::float(op)
        })
        .collect();

    let quantized = Graph {
        variant:     Variant::DynamicRange,
        input_len:   graph.input_len,
        num_classes: graph.num_classes,
        nodes,
    };
    quantized.check()?;
    Ok(quantized)
}
