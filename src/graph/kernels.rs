// ============================================================
// Layer 7: Op Kernels
// ============================================================
// Float kernels run Float32 graphs, DynamicRange graphs (after
// their weights are dequantized) and calibration.
//
// Integer kernels run FullInteger graphs. The arithmetic follows
// the usual int8 inference scheme (Jacob et al., 2018):
//
//   real = scale * (q - zero_point)
//
//   dense:  acc_i32 = Σ (x_q - x_zp) * w_q + bias_i32
//           real    = acc_i32 * (x_scale * w_scale)
//           out_q   = round(real / out_scale) + out_zp
//
// Weights are symmetric (zero point 0) and biases are int32 in
// the accumulator's scale, so only the final rescale touches f32.

use super::{Activation, GraphError, QuantParams};
use crate::data::preprocessor::PAD_ID;

/// Quantization the softmax output always uses: [0, 1) in 256 steps.
pub const SOFTMAX_OUTPUT_QUANT: QuantParams = QuantParams {
    scale:      1.0 / 256.0,
    zero_point: -128,
};

fn check_ids(ids: &[i32], vocab_size: usize) -> Result<(), GraphError> {
    match ids.iter().find(|&&id| id < 0 || id as usize >= vocab_size) {
        Some(&id) => Err(GraphError::TokenOutOfRange { id, vocab_size }),
        None => Ok(()),
    }
}

// ─── Float kernels ────────────────────────────────────────────────────────────

/// Gather one table row per id: [len] → [len * dim]
pub fn embedding_f32(ids: &[i32], table: &[f32], dim: usize) -> Result<Vec<f32>, GraphError> {
    check_ids(ids, table.len() / dim.max(1))?;
    let mut out = Vec::with_capacity(ids.len() * dim);
    for &id in ids {
        let row = id as usize * dim;
        out.extend_from_slice(&table[row..row + dim]);
    }
    Ok(out)
}

/// Rows whose id is not <PAD>.
fn is_token(id: i32) -> bool {
    id != PAD_ID as i32
}

/// Average the rows of real tokens: [len * dim] → [dim].
/// `ids` are the ids the rows were gathered for; an all-padding
/// sequence pools to zeros.
pub fn mean_pool_f32(x: &[f32], ids: &[i32], dim: usize) -> Vec<f32> {
    let mut out   = vec![0.0f32; dim];
    let mut count = 0usize;
    for (row, _) in x.chunks_exact(dim).zip(ids).filter(|&(_, &id)| is_token(id)) {
        for (o, v) in out.iter_mut().zip(row) {
            *o += v;
        }
        count += 1;
    }
    if count > 0 {
        out.iter_mut().for_each(|o| *o /= count as f32);
    }
    out
}

/// x [in] · W [in, out] + b [out]
pub fn dense_f32(x: &[f32], weights: &[f32], bias: &[f32], activation: Activation) -> Vec<f32> {
    let out_dim = bias.len();
    let mut out = bias.to_vec();
    for (i, &xi) in x.iter().enumerate() {
        let row = &weights[i * out_dim..(i + 1) * out_dim];
        for (o, &w) in out.iter_mut().zip(row) {
            *o += xi * w;
        }
    }
    if activation == Activation::Relu {
        out.iter_mut().for_each(|o| *o = o.max(0.0));
    }
    out
}

/// Numerically stable softmax.
pub fn softmax_f32(x: &[f32]) -> Vec<f32> {
    let max = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = x.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// ─── Integer kernels ──────────────────────────────────────────────────────────

/// Gather int8 rows; the output keeps the table's quantization.
pub fn embedding_i8(ids: &[i32], table: &[i8], dim: usize) -> Result<Vec<i8>, GraphError> {
    check_ids(ids, table.len() / dim.max(1))?;
    let mut out = Vec::with_capacity(ids.len() * dim);
    for &id in ids {
        let row = id as usize * dim;
        out.extend_from_slice(&table[row..row + dim]);
    }
    Ok(out)
}

/// Mean over the real tokens with an i32 accumulator, then requantize.
pub fn mean_pool_i8(
    x:      &[i8],
    ids:    &[i32],
    dim:    usize,
    input:  QuantParams,
    output: QuantParams,
) -> Vec<i8> {
    let mut acc   = vec![0i32; dim];
    let mut count = 0usize;
    for (row, _) in x.chunks_exact(dim).zip(ids).filter(|&(_, &id)| is_token(id)) {
        for (a, &q) in acc.iter_mut().zip(row) {
            *a += q as i32 - input.zero_point;
        }
        count += 1;
    }
    let multiplier = input.scale / (output.scale * count.max(1) as f32);
    acc.into_iter()
        .map(|a| requantize(a, multiplier, output.zero_point))
        .collect()
}

/// Integer dense layer. `weight_scale` is the symmetric weight scale;
/// `bias` is already in the accumulator scale (input.scale * weight_scale).
pub fn dense_i8(
    x:            &[i8],
    input:        QuantParams,
    weights:      &[i8],
    weight_scale: f32,
    bias:         &[i32],
    output:       QuantParams,
    activation:   Activation,
) -> Vec<i8> {
    let out_dim = bias.len();
    let mut acc = bias.to_vec();
    for (i, &xq) in x.iter().enumerate() {
        let xv  = xq as i32 - input.zero_point;
        let row = &weights[i * out_dim..(i + 1) * out_dim];
        for (a, &w) in acc.iter_mut().zip(row) {
            *a += xv * w as i32;
        }
    }
    if activation == Activation::Relu {
        acc.iter_mut().for_each(|a| *a = (*a).max(0));
    }
    let multiplier = input.scale * weight_scale / output.scale;
    acc.into_iter()
        .map(|a| requantize(a, multiplier, output.zero_point))
        .collect()
}

/// Dequantize logits, softmax in f32, emit SOFTMAX_OUTPUT_QUANT codes.
pub fn softmax_i8(x: &[i8], input: QuantParams) -> Vec<i8> {
    let real: Vec<f32> = x.iter().map(|&q| input.dequantize(q)).collect();
    softmax_f32(&real)
        .into_iter()
        .map(|p| SOFTMAX_OUTPUT_QUANT.quantize(p))
        .collect()
}

fn requantize(acc: i32, multiplier: f32, zero_point: i32) -> i8 {
    let q = (acc as f32 * multiplier).round() as i64 + zero_point as i64;
    q.clamp(i8::MIN as i64, i8::MAX as i64) as i8
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_rejects_out_of_range_ids() {
        let table = vec![0.0f32; 3 * 2];
        assert!(embedding_f32(&[0, 2], &table, 2).is_ok());
        assert!(matches!(
            embedding_f32(&[3], &table, 2),
            Err(GraphError::TokenOutOfRange { id: 3, vocab_size: 3 })
        ));
        assert!(embedding_f32(&[-1], &table, 2).is_err());
    }

    #[test]
    fn test_mean_pool_skips_padding_rows() {
        // rows [2,4] (id 5), [4,8] (id 7) and a <PAD> row [9,9] → mean [3,6]
        let x = [2.0, 4.0, 4.0, 8.0, 9.0, 9.0];
        assert_eq!(mean_pool_f32(&x, &[5, 7, 0], 2), vec![3.0, 6.0]);
    }

    #[test]
    fn test_mean_pool_of_only_padding_is_zero() {
        assert_eq!(mean_pool_f32(&[1.0, 2.0, 3.0, 4.0], &[0, 0], 2), vec![0.0, 0.0]);

        let q = QuantParams { scale: 0.1, zero_point: 3 };
        assert_eq!(mean_pool_i8(&[10, 20, 30, 40], &[0, 0], 2, q, q), vec![3, 3]);
    }

    #[test]
    fn test_mean_pool_i8_tracks_float_result() {
        let input  = QuantParams { scale: 0.01, zero_point: 0 };
        let output = QuantParams { scale: 0.01, zero_point: 0 };
        // real rows [0.2, 0.4], [0.4, 0.8], padding [1.0, 1.0]
        let x = [20i8, 40, 40, 80, 100, 100];
        assert_eq!(mean_pool_i8(&x, &[4, 9, 0], 2, input, output), vec![30, 60]);
    }

    #[test]
    fn test_dense_with_relu() {
        // x=[1,2], W=[[1,-1],[1,-1]], b=[0.5,0.5] → [3.5,-2.5] → relu [3.5,0]
        let out = dense_f32(&[1.0, 2.0], &[1.0, -1.0, 1.0, -1.0], &[0.5, 0.5], Activation::Relu);
        assert_eq!(out, vec![3.5, 0.0]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax_f32(&[1.0, 2.0, 3.0, 1000.0]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(p[3] > 0.99);
    }

    #[test]
    fn test_dense_i8_tracks_float_result() {
        let input  = QuantParams { scale: 0.02, zero_point: 0 };
        let output = QuantParams { scale: 0.05, zero_point: -128 };
        let w_scale = 0.01;

        let x_real = [1.0f32, 2.0];
        let w_real = [1.0f32, -1.0, 0.5, 0.25];
        let b_real = [0.5f32, 0.5];

        let xq: Vec<i8>  = x_real.iter().map(|&v| input.quantize(v)).collect();
        let wq: Vec<i8>  = w_real.iter().map(|&v| (v / w_scale).round() as i8).collect();
        let bq: Vec<i32> = b_real.iter().map(|&v| (v / (input.scale * w_scale)).round() as i32).collect();

        let q = dense_i8(&xq, input, &wq, w_scale, &bq, output, Activation::Relu);
        let got: Vec<f32> = q.iter().map(|&v| output.dequantize(v)).collect();
        let want = dense_f32(&x_real, &w_real, &b_real, Activation::Relu);

        for (g, w) in got.iter().zip(&want) {
            assert!((g - w).abs() <= output.scale, "got {g}, want {w}");
        }
    }

    #[test]
    fn test_softmax_i8_output_scale() {
        let input = QuantParams { scale: 0.1, zero_point: 0 };
        let q     = softmax_i8(&[100, 0], input);
        let p: Vec<f32> = q.iter().map(|&v| SOFTMAX_OUTPUT_QUANT.dequantize(v)).collect();
        assert!(p[0] > 0.99 && p[0] < 1.0);
        assert!(p[1] < 0.01);
    }
}
