// ============================================================
// Layer 7: Portable Inference Graph
// ============================================================
// A self-contained description of the trained classifier that
// a lightweight runtime can execute without burn:
//
//   input  int32 [1, L]        (padded token ids)
//     │
//   Embedding     table [V, D]  → [L, D]
//   MeanPool                    → [D]   (over non-<PAD> ids)
//   FullyConnected + Relu       → [H]
//   FullyConnected + Relu       → [H/2]
//   FullyConnected              → [C]
//   Softmax                     → [C]
//     │
//   output [1, C]  probabilities
//
// Dropout only exists at training time, so it has no node.
//
// Three variants share this shape:
//   Float32        every constant stored as f32
//   FullInteger    int8 weights AND int8 activations; each node
//                  carries the quantization of its output,
//                  calibrated on representative inputs
//   DynamicRange   int8 weights, f32 activations (the fallback
//                  when calibration is impossible)
//
// Modules:
//   codec.rs         binary encoding with checksum
//   kernels.rs       float and int8 op implementations
//   quantize.rs      Float32 → FullInteger / DynamicRange
//   interpreter.rs   load, allocate, set input, invoke, read

pub mod codec;
pub mod interpreter;
pub mod kernels;
pub mod quantize;

use thiserror::Error;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("not an intent graph (bad magic bytes)")]
    BadMagic,

    #[error("unsupported graph format version {0}")]
    UnsupportedVersion(u16),

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("graph data is truncated")]
    Truncated,

    #[error("unknown {what} tag {tag}")]
    UnknownTag { what: &'static str, tag: u8 },

    #[error("invalid graph: {0}")]
    Invalid(String),

    #[error("tensors are not allocated; call allocate_tensors() first")]
    NotAllocated,

    #[error("input has {got} token ids, graph expects {expected}")]
    InputLength { expected: usize, got: usize },

    #[error("token id {id} is outside the embedding table of {vocab_size} rows")]
    TokenOutOfRange { id: i32, vocab_size: usize },

    #[error("no input set; call set_input() first")]
    NoInput,

    #[error("no output available; call invoke() first")]
    NoOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Data model ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Float32,
    FullInteger,
    DynamicRange,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Float32      => "float32",
            Variant::FullInteger  => "full_integer",
            Variant::DynamicRange => "dynamic_range",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    None,
    Relu,
}

/// Affine int8 mapping: real = scale * (q - zero_point)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale:      f32,
    pub zero_point: i32,
}

impl QuantParams {
    pub fn quantize(&self, real: f32) -> i8 {
        let q = (real / self.scale).round() as i64 + self.zero_point as i64;
        q.clamp(i8::MIN as i64, i8::MAX as i64) as i8
    }

    pub fn dequantize(&self, q: i8) -> f32 {
        self.scale * (q as i32 - self.zero_point) as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I8 { values: Vec<i8>, quant: QuantParams },
    I32(Vec<i32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstTensor {
    pub shape: Vec<usize>,
    pub data:  TensorData,
}

impl ConstTensor {
    pub fn f32(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, data: TensorData::F32(values) }
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn len(&self) -> usize {
        match &self.data {
            TensorData::F32(v)          => v.len(),
            TensorData::I8 { values, .. } => values.len(),
            TensorData::I32(v)          => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values as f32, dequantizing int8 payloads.
    /// I32 payloads (integer biases) have no scale of their own
    /// and are returned as plain numbers.
    pub fn to_f32(&self) -> Vec<f32> {
        match &self.data {
            TensorData::F32(v)              => v.clone(),
            TensorData::I8 { values, quant } => values.iter().map(|&q| quant.dequantize(q)).collect(),
            TensorData::I32(v)              => v.iter().map(|&x| x as f32).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// table: [vocab_size, dim]
    Embedding { table: ConstTensor },
    /// [len, dim] → [dim], averaging only the rows of non-<PAD> ids
    MeanPool,
    /// weights: [in, out] row-major, bias: [out]
    FullyConnected {
        weights:    ConstTensor,
        bias:       ConstTensor,
        activation: Activation,
    },
    Softmax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: Op,
    /// Quantization of this node's output (FullInteger only)
    pub output_quant: Option<QuantParams>,
}

impl Node {
    pub fn float(op: Op) -> Self {
        Self { op, output_quant: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub variant:     Variant,
    /// Padded sequence length L (input shape [1, L])
    pub input_len:   usize,
    /// Number of classes C (output shape [1, C])
    pub num_classes: usize,
    pub nodes:       Vec<Node>,
}

impl Graph {
    pub fn input_shape(&self) -> [usize; 2] {
        [1, self.input_len]
    }

    pub fn output_shape(&self) -> [usize; 2] {
        [1, self.num_classes]
    }

    /// Rows in the embedding table, i.e. the accepted token id range.
    pub fn vocab_size(&self) -> Option<usize> {
        self.nodes.iter().find_map(|n| match &n.op {
            Op::Embedding { table } => table.shape.first().copied(),
            _ => None,
        })
    }

    /// Structural checks shared by the codec and the interpreter:
    /// the node chain must start with an embedding, contain a pool,
    /// end in a softmax, and every tensor must match its shape.
    pub fn check(&self) -> Result<(), GraphError> {
        let invalid = |msg: String| Err(GraphError::Invalid(msg));

        if self.input_len == 0 || self.num_classes == 0 {
            return invalid("input length and class count must be non-zero".into());
        }
        match self.nodes.first().map(|n| &n.op) {
            Some(Op::Embedding { .. }) => {}
            _ => return invalid("first node must be an embedding".into()),
        }
        match self.nodes.last().map(|n| &n.op) {
            Some(Op::Softmax) => {}
            _ => return invalid("last node must be a softmax".into()),
        }

        // Walk the chain tracking the width flowing between nodes
        let mut width: Option<usize> = None;
        let mut pooled = false;

        for (i, node) in self.nodes.iter().enumerate() {
            if self.variant == Variant::FullInteger && node.output_quant.is_none() {
                return invalid(format!("node {i} has no output quantization"));
            }
            match &node.op {
                Op::Embedding { table } => {
                    if i != 0 || table.shape.len() != 2 || table.len() != table.element_count() {
                        return invalid(format!("node {i}: malformed embedding table"));
                    }
                    width = Some(table.shape[1]);
                }
                Op::MeanPool => {
                    if pooled {
                        return invalid(format!("node {i}: sequence already pooled"));
                    }
                    pooled = true;
                }
                Op::FullyConnected { weights, bias, .. } => {
                    if !pooled {
                        return invalid(format!("node {i}: dense layer before pooling"));
                    }
                    if weights.shape.len() != 2
                        || weights.len() != weights.element_count()
                        || bias.shape != [weights.shape[1]]
                        || bias.len() != bias.element_count()
                    {
                        return invalid(format!("node {i}: malformed dense layer"));
                    }
                    if width != Some(weights.shape[0]) {
                        return invalid(format!(
                            "node {i}: expects width {}, receives {:?}",
                            weights.shape[0], width
                        ));
                    }
                    width = Some(weights.shape[1]);
                }
                Op::Softmax => {}
            }
        }

        if !pooled {
            return invalid("graph never pools the sequence".into());
        }
        if width != Some(self.num_classes) {
            return invalid(format!(
                "output width {:?} does not match {} classes",
                width, self.num_classes
            ));
        }
        Ok(())
    }
}

// ─── Test fixtures ────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A tiny deterministic float graph: vocab 6, dim 4, hidden 3, 2 classes.
    /// Token 2 pushes towards class 0, token 3 towards class 1.
    pub fn tiny_float_graph() -> Graph {
        let mut table = vec![0.0f32; 6 * 4];
        for d in 0..4 {
            table[2 * 4 + d] = 1.0 + d as f32 * 0.1;
            table[3 * 4 + d] = -1.0 - d as f32 * 0.1;
            table[4 * 4 + d] = 0.25;
        }
        let w1: Vec<f32> = (0..4 * 3)
            .map(|i| if i % 3 == 0 { 0.8 } else if i % 3 == 1 { -0.8 } else { 0.1 })
            .collect();
        let w2 = vec![1.5, -1.5, -1.5, 1.5, 0.2, 0.2];

        Graph {
            variant:     Variant::Float32,
            input_len:   5,
            num_classes: 2,
            nodes: vec![
                Node::float(Op::Embedding { table: ConstTensor::f32(vec![6, 4], table) }),
                Node::float(Op::MeanPool),
                Node::float(Op::FullyConnected {
                    weights:    ConstTensor::f32(vec![4, 3], w1),
                    bias:       ConstTensor::f32(vec![3], vec![0.05, 0.05, 0.0]),
                    activation: Activation::Relu,
                }),
                Node::float(Op::FullyConnected {
                    weights:    ConstTensor::f32(vec![3, 2], w2),
                    bias:       ConstTensor::f32(vec![2], vec![0.0, 0.0]),
                    activation: Activation::None,
                }),
                Node::float(Op::Softmax),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_well_formed() {
        let g = fixtures::tiny_float_graph();
        assert!(g.check().is_ok());
        assert_eq!(g.vocab_size(), Some(6));
        assert_eq!(g.input_shape(), [1, 5]);
        assert_eq!(g.output_shape(), [1, 2]);
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let mut g = fixtures::tiny_float_graph();
        g.num_classes = 3;
        assert!(matches!(g.check(), Err(GraphError::Invalid(_))));
    }

    #[test]
    fn test_full_integer_requires_output_quant() {
        let mut g = fixtures::tiny_float_graph();
        g.variant = Variant::FullInteger;
        assert!(g.check().is_err());
    }

    #[test]
    fn test_quant_params_round_trip_within_one_step() {
        let q = QuantParams { scale: 0.05, zero_point: -10 };
        for real in [-5.0f32, -0.3, 0.0, 0.42, 3.0] {
            let back = q.dequantize(q.quantize(real));
            assert!((back - real).abs() <= 0.05 / 2.0 + 1e-6, "{real} → {back}");
        }
        // Saturates instead of wrapping
        assert_eq!(q.quantize(1000.0), i8::MAX);
        assert_eq!(q.quantize(-1000.0), i8::MIN);
    }
}
