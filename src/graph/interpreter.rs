// ============================================================
// Layer 7: Graph Interpreter
// ============================================================
// The lightweight runtime a client uses to execute an exported
// graph. The call sequence mirrors an on-device interpreter:
//
//   let mut it = Interpreter::from_file("assets/model.tflite")?;
//   it.allocate_tensors()?;          // build the execution plan
//   it.set_input(&padded_ids)?;      // int32 [1, L]
//   it.invoke()?;                    // run every node in order
//   let probs = it.output()?;        // f32 [C], dequantized
//
// allocate_tensors() turns the stored constants into a plan:
//   Float32      → float plan, constants used as-is
//   DynamicRange → float plan, int8 weights dequantized once
//   FullInteger  → integer plan, int8 end to end

use std::path::Path;

use anyhow::{Context, Result};

use super::{
    codec,
    kernels::{
        dense_f32, dense_i8, embedding_f32, embedding_i8, mean_pool_f32, mean_pool_i8,
        softmax_f32, softmax_i8,
    },
    Activation, Graph, GraphError, Op, QuantParams, TensorData, Variant,
};
use crate::domain::traits::IntentPredictor;

/// Shape and element type of an input or output tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDetails {
    pub shape: [usize; 2],
    pub dtype: &'static str,
    pub quant: Option<QuantParams>,
}

// ─── Execution plans ──────────────────────────────────────────────────────────

enum FloatStep {
    Embedding { table: Vec<f32>, dim: usize },
    MeanPool { dim: usize },
    Dense { weights: Vec<f32>, bias: Vec<f32>, activation: Activation },
    Softmax,
}

enum IntStep {
    Embedding { table: Vec<i8>, dim: usize },
    MeanPool { dim: usize },
    Dense {
        weights:      Vec<i8>,
        weight_scale: f32,
        bias:         Vec<i32>,
        activation:   Activation,
    },
    Softmax,
}

enum Plan {
    Float(Vec<FloatStep>),
    /// Each step paired with the quantization of its output
    Integer(Vec<(IntStep, QuantParams)>),
}

pub struct Interpreter {
    graph:  Graph,
    plan:   Option<Plan>,
    input:  Option<Vec<i32>>,
    output: Option<Vec<f32>>,
}

impl Interpreter {
    pub fn new(graph: Graph) -> Self {
        Self { graph, plan: None, input: None, output: None }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        Ok(Self::new(codec::decode(bytes)?))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path  = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read graph '{}'", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("Cannot load graph '{}'", path.display()))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Build the execution plan. Must be called once before set_input().
    pub fn allocate_tensors(&mut self) -> Result<(), GraphError> {
        self.graph.check()?;
        let plan = match self.graph.variant {
            Variant::Float32 | Variant::DynamicRange => Plan::Float(self.float_plan()?),
            Variant::FullInteger => Plan::Integer(self.integer_plan()?),
        };
        self.plan   = Some(plan);
        self.input  = None;
        self.output = None;
        Ok(())
    }

    pub fn input_details(&self) -> TensorDetails {
        TensorDetails { shape: self.graph.input_shape(), dtype: "int32", quant: None }
    }

    pub fn output_details(&self) -> TensorDetails {
        let quant = match self.graph.variant {
            Variant::FullInteger => self.graph.nodes.last().and_then(|n| n.output_quant),
            _ => None,
        };
        TensorDetails {
            shape: self.graph.output_shape(),
            dtype: if quant.is_some() { "int8" } else { "float32" },
            quant,
        }
    }

    /// Copy one padded sequence into the input tensor.
    pub fn set_input(&mut self, token_ids: &[i32]) -> Result<(), GraphError> {
        if self.plan.is_none() {
            return Err(GraphError::NotAllocated);
        }
        self.check_input(token_ids)?;
        self.input  = Some(token_ids.to_vec());
        self.output = None;
        Ok(())
    }

    pub fn invoke(&mut self) -> Result<(), GraphError> {
        let input = self.input.as_deref().ok_or(GraphError::NoInput)?;
        let probs = match self.plan.as_ref().ok_or(GraphError::NotAllocated)? {
            Plan::Float(steps)   => run_float(steps, input, &mut |_: usize, _: &[f32]| {})?,
            Plan::Integer(steps) => run_integer(steps, input)?,
        };
        self.output = Some(probs);
        Ok(())
    }

    /// Class probabilities from the last invoke(), dequantized to f32.
    pub fn output(&self) -> Result<Vec<f32>, GraphError> {
        self.output.clone().ok_or(GraphError::NoOutput)
    }

    /// Run a float plan on one input, reporting every node's output.
    /// Used to record activation ranges for calibration.
    pub(crate) fn observe(
        &self,
        token_ids: &[i32],
        observer:  &mut dyn FnMut(usize, &[f32]),
    ) -> Result<Vec<f32>, GraphError> {
        self.check_input(token_ids)?;
        match self.plan.as_ref().ok_or(GraphError::NotAllocated)? {
            Plan::Float(steps) => run_float(steps, token_ids, observer),
            Plan::Integer(_) => Err(GraphError::Invalid(
                "activation ranges can only be observed on a float graph".into(),
            )),
        }
    }

    fn check_input(&self, token_ids: &[i32]) -> Result<(), GraphError> {
        if token_ids.len() != self.graph.input_len {
            return Err(GraphError::InputLength {
                expected: self.graph.input_len,
                got:      token_ids.len(),
            });
        }
        let vocab_size = self.graph.vocab_size().unwrap_or(0);
        match token_ids.iter().find(|&&id| id < 0 || id as usize >= vocab_size) {
            Some(&id) => Err(GraphError::TokenOutOfRange { id, vocab_size }),
            None => Ok(()),
        }
    }

    // ── Plan construction ────────────────────────────────────────────────────

    fn float_plan(&self) -> Result<Vec<FloatStep>, GraphError> {
        let mut dim   = 0;
        let mut steps = Vec::with_capacity(self.graph.nodes.len());

        for node in &self.graph.nodes {
            steps.push(match &node.op {
                Op::Embedding { table } => {
                    dim = table.shape[1];
                    FloatStep::Embedding { table: table.to_f32(), dim }
                }
                Op::MeanPool => FloatStep::MeanPool { dim },
                Op::FullyConnected { weights, bias, activation } => {
                    if matches!(bias.data, TensorData::I32(_)) {
                        return Err(GraphError::Invalid(
                            "integer bias in a float graph".into(),
                        ));
                    }
                    FloatStep::Dense {
                        weights:    weights.to_f32(),
                        bias:       bias.to_f32(),
                        activation: *activation,
                    }
                }
                Op::Softmax => FloatStep::Softmax,
            });
        }
        Ok(steps)
    }

    fn integer_plan(&self) -> Result<Vec<(IntStep, QuantParams)>, GraphError> {
        let mut dim   = 0;
        let mut steps = Vec::with_capacity(self.graph.nodes.len());

        for (i, node) in self.graph.nodes.iter().enumerate() {
            let out = node.output_quant.ok_or_else(|| {
                GraphError::Invalid(format!("node {i} has no output quantization"))
            })?;

            let step = match &node.op {
                Op::Embedding { table } => {
                    dim = table.shape[1];
                    match &table.data {
                        TensorData::I8 { values, quant } if *quant == out => {
                            IntStep::Embedding { table: values.clone(), dim }
                        }
                        _ => {
                            return Err(GraphError::Invalid(
                                "embedding table must be int8 in its output quantization".into(),
                            ))
                        }
                    }
                }
                Op::MeanPool => IntStep::MeanPool { dim },
                Op::FullyConnected { weights, bias, activation } => {
                    match (&weights.data, &bias.data) {
                        (TensorData::I8 { values, quant }, TensorData::I32(b))
                            if quant.zero_point == 0 =>
                        {
                            IntStep::Dense {
                                weights:      values.clone(),
                                weight_scale: quant.scale,
                                bias:         b.clone(),
                                activation:   *activation,
                            }
                        }
                        _ => {
                            return Err(GraphError::Invalid(format!(
                                "node {i}: integer dense layer needs symmetric int8 weights and int32 bias"
                            )))
                        }
                    }
                }
                Op::Softmax => IntStep::Softmax,
            };
            steps.push((step, out));
        }
        Ok(steps)
    }
}

// ─── Execution ────────────────────────────────────────────────────────────────

fn run_float(
    steps:    &[FloatStep],
    ids:      &[i32],
    observer: &mut dyn FnMut(usize, &[f32]),
) -> Result<Vec<f32>, GraphError> {
    let mut x: Vec<f32> = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        x = match step {
            FloatStep::Embedding { table, dim } => embedding_f32(ids, table, *dim)?,
            FloatStep::MeanPool { dim } => mean_pool_f32(&x, ids, *dim),
            FloatStep::Dense { weights, bias, activation } => {
                dense_f32(&x, weights, bias, *activation)
            }
            FloatStep::Softmax => softmax_f32(&x),
        };
        observer(i, &x);
    }
    Ok(x)
}

fn run_integer(steps: &[(IntStep, QuantParams)], ids: &[i32]) -> Result<Vec<f32>, GraphError> {
    let mut x: Vec<i8> = Vec::new();
    // Quantization of `x` as produced by the previous step
    let mut current: Option<QuantParams> = None;

    for (step, out) in steps {
        x = match (step, current) {
            (IntStep::Embedding { table, dim }, _) => embedding_i8(ids, table, *dim)?,
            (IntStep::MeanPool { dim }, Some(input)) => mean_pool_i8(&x, ids, *dim, input, *out),
            (IntStep::Dense { weights, weight_scale, bias, activation }, Some(input)) => {
                dense_i8(&x, input, weights, *weight_scale, bias, *out, *activation)
            }
            (IntStep::Softmax, Some(input)) => softmax_i8(&x, input),
            (_, None) => return Err(GraphError::Invalid("graph must start with an embedding".into())),
        };
        current = Some(*out);
    }

    let out = current.ok_or(GraphError::NoOutput)?;
    Ok(x.iter().map(|&q| out.dequantize(q)).collect())
}

// ─── IntentPredictor ──────────────────────────────────────────────────────────

impl IntentPredictor for Interpreter {
    fn predict(&mut self, token_ids: &[i32]) -> Result<Vec<f32>> {
        if self.plan.is_none() {
            self.allocate_tensors()?;
        }
        self.set_input(token_ids)?;
        self.invoke()?;
        Ok(self.output()?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::tiny_float_graph;

    fn ready() -> Interpreter {
        let bytes = codec::encode(&tiny_float_graph()).unwrap();
        let mut it = Interpreter::from_bytes(&bytes).unwrap();
        it.allocate_tensors().unwrap();
        it
    }

    #[test]
    fn test_full_call_sequence() {
        let mut it = ready();
        assert_eq!(it.input_details().shape, [1, 5]);
        assert_eq!(it.output_details().dtype, "float32");

        it.set_input(&[2, 2, 0, 0, 0]).unwrap();
        it.invoke().unwrap();
        let probs = it.output().unwrap();
        assert_eq!(probs.len(), 2);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[0] > 0.9);

        it.set_input(&[3, 3, 3, 0, 0]).unwrap();
        it.invoke().unwrap();
        assert!(it.output().unwrap()[1] > 0.9);
    }

    #[test]
    fn test_calls_out_of_order_fail() {
        let mut it = Interpreter::new(tiny_float_graph());
        assert!(matches!(it.set_input(&[0; 5]), Err(GraphError::NotAllocated)));
        it.allocate_tensors().unwrap();
        assert!(matches!(it.invoke(), Err(GraphError::NoInput)));
        assert!(matches!(it.output(), Err(GraphError::NoOutput)));
    }

    #[test]
    fn test_input_is_validated() {
        let mut it = ready();
        assert!(matches!(
            it.set_input(&[1, 2, 3]),
            Err(GraphError::InputLength { expected: 5, got: 3 })
        ));
        assert!(matches!(
            it.set_input(&[0, 0, 0, 0, 6]),
            Err(GraphError::TokenOutOfRange { id: 6, vocab_size: 6 })
        ));
    }

    #[test]
    fn test_predict_allocates_on_first_use() {
        let mut it = Interpreter::new(tiny_float_graph());
        let probs = it.predict(&[2, 0, 0, 0, 0]).unwrap();
        assert!(probs[0] > probs[1]);
    }
}
