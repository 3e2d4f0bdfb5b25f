// ============================================================
// Layer 7: Graph Codec
// ============================================================
// Binary layout (all integers little-endian):
//
//   magic        4 bytes  "ICGF"
//   version      u16
//   variant      u8       0 = float32, 1 = full_integer, 2 = dynamic_range
//   input_len    u32
//   num_classes  u32
//   node_count   u32
//   node*        see below
//   crc32        u32      over every preceding byte
//
//   node:
//     op tag       u8     1 = embedding, 2 = mean_pool,
//                         3 = fully_connected, 4 = softmax
//     has_quant    u8     0 | 1, then scale f32 + zero_point i32
//     embedding:        tensor
//     fully_connected:  activation u8 (0 none, 1 relu), tensor, tensor
//
//   tensor:
//     dtype        u8     0 = f32, 1 = i8, 2 = i32
//     rank         u8
//     dims         u32 * rank
//     (i8 only)    scale f32 + zero_point i32
//     data         element_count * sizeof(dtype)

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{Activation, ConstTensor, Graph, GraphError, Node, Op, QuantParams, TensorData, Variant};

pub const MAGIC: &[u8; 4] = b"ICGF";
pub const FORMAT_VERSION: u16 = 1;

const OP_EMBEDDING: u8 = 1;
const OP_MEAN_POOL: u8 = 2;
const OP_FULLY_CONNECTED: u8 = 3;
const OP_SOFTMAX: u8 = 4;

const DTYPE_F32: u8 = 0;
const DTYPE_I8: u8 = 1;
const DTYPE_I32: u8 = 2;

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// Serialise a graph. Writing into a Vec cannot fail, so the
/// io::Result from byteorder is only propagated for form.
pub fn encode(graph: &Graph) -> Result<Vec<u8>, GraphError> {
    graph.check()?;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    buf.write_u8(variant_tag(graph.variant))?;
    buf.write_u32::<LittleEndian>(graph.input_len as u32)?;
    buf.write_u32::<LittleEndian>(graph.num_classes as u32)?;
    buf.write_u32::<LittleEndian>(graph.nodes.len() as u32)?;

    for node in &graph.nodes {
        write_node(&mut buf, node)?;
    }

    let crc = crc32fast::hash(&buf);
    buf.write_u32::<LittleEndian>(crc)?;
    Ok(buf)
}

fn variant_tag(variant: Variant) -> u8 {
    match variant {
        Variant::Float32      => 0,
        Variant::FullInteger  => 1,
        Variant::DynamicRange => 2,
    }
}

fn write_node(buf: &mut Vec<u8>, node: &Node) -> Result<(), GraphError> {
    let tag = match node.op {
        Op::Embedding { .. }      => OP_EMBEDDING,
        Op::MeanPool              => OP_MEAN_POOL,
        Op::FullyConnected { .. } => OP_FULLY_CONNECTED,
        Op::Softmax               => OP_SOFTMAX,
    };
    buf.write_u8(tag)?;

    match node.output_quant {
        Some(q) => {
            buf.write_u8(1)?;
            write_quant(buf, q)?;
        }
        None => buf.write_u8(0)?,
    }

    match &node.op {
        Op::Embedding { table } => write_tensor(buf, table)?,
        Op::FullyConnected { weights, bias, activation } => {
            buf.write_u8(match activation {
                Activation::None => 0,
                Activation::Relu => 1,
            })?;
            write_tensor(buf, weights)?;
            write_tensor(buf, bias)?;
        }
        Op::MeanPool | Op::Softmax => {}
    }
    Ok(())
}

fn write_quant(buf: &mut Vec<u8>, q: QuantParams) -> Result<(), GraphError> {
    buf.write_f32::<LittleEndian>(q.scale)?;
    buf.write_i32::<LittleEndian>(q.zero_point)?;
    Ok(())
}

fn write_tensor(buf: &mut Vec<u8>, t: &ConstTensor) -> Result<(), GraphError> {
    let dtype = match t.data {
        TensorData::F32(_)    => DTYPE_F32,
        TensorData::I8 { .. } => DTYPE_I8,
        TensorData::I32(_)    => DTYPE_I32,
    };
    buf.write_u8(dtype)?;
    buf.write_u8(t.shape.len() as u8)?;
    for &d in &t.shape {
        buf.write_u32::<LittleEndian>(d as u32)?;
    }

    match &t.data {
        TensorData::F32(values) => {
            for &v in values {
                buf.write_f32::<LittleEndian>(v)?;
            }
        }
        TensorData::I8 { values, quant } => {
            write_quant(buf, *quant)?;
            for &v in values {
                buf.write_i8(v)?;
            }
        }
        TensorData::I32(values) => {
            for &v in values {
                buf.write_i32::<LittleEndian>(v)?;
            }
        }
    }
    Ok(())
}

// ─── Decoding ─────────────────────────────────────────────────────────────────

/// Parse and verify a serialised graph.
pub fn decode(bytes: &[u8]) -> Result<Graph, GraphError> {
    // magic + version + crc is the smallest thing worth looking at
    if bytes.len() < MAGIC.len() + 2 + 4 {
        return Err(GraphError::Truncated);
    }
    if &bytes[..4] != MAGIC {
        return Err(GraphError::BadMagic);
    }

    let (body, tail) = bytes.split_at(bytes.len() - 4);
    let stored   = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = crc32fast::hash(body);

    let mut r = Cursor::new(&body[4..]);
    let version = read(r.read_u16::<LittleEndian>())?;
    if version != FORMAT_VERSION {
        return Err(GraphError::UnsupportedVersion(version));
    }
    if stored != computed {
        return Err(GraphError::ChecksumMismatch { stored, computed });
    }

    let variant = match read(r.read_u8())? {
        0 => Variant::Float32,
        1 => Variant::FullInteger,
        2 => Variant::DynamicRange,
        tag => return Err(GraphError::UnknownTag { what: "variant", tag }),
    };
    let input_len   = read(r.read_u32::<LittleEndian>())? as usize;
    let num_classes = read(r.read_u32::<LittleEndian>())? as usize;
    let node_count  = read(r.read_u32::<LittleEndian>())? as usize;

    let mut nodes = Vec::new();
    for _ in 0..node_count {
        nodes.push(read_node(&mut r)?);
    }

    if (r.position() as usize) != r.get_ref().len() {
        return Err(GraphError::Invalid("trailing bytes after last node".into()));
    }

    let graph = Graph { variant, input_len, num_classes, nodes };
    graph.check()?;
    Ok(graph)
}

/// Map end-of-data to Truncated; keep other I/O errors as they are.
fn read<T>(res: std::io::Result<T>) -> Result<T, GraphError> {
    res.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => GraphError::Truncated,
        _ => GraphError::Io(e),
    })
}

fn read_quant(r: &mut Cursor<&[u8]>) -> Result<QuantParams, GraphError> {
    Ok(QuantParams {
        scale:      read(r.read_f32::<LittleEndian>())?,
        zero_point: read(r.read_i32::<LittleEndian>())?,
    })
}

fn read_node(r: &mut Cursor<&[u8]>) -> Result<Node, GraphError> {
    let tag = read(r.read_u8())?;
    let output_quant = match read(r.read_u8())? {
        0 => None,
        1 => Some(read_quant(r)?),
        other => return Err(GraphError::UnknownTag { what: "quant flag", tag: other }),
    };

    let op = match tag {
        OP_EMBEDDING => Op::Embedding { table: read_tensor(r)? },
        OP_MEAN_POOL => Op::MeanPool,
        OP_FULLY_CONNECTED => {
            let activation = match read(r.read_u8())? {
                0 => Activation::None,
                1 => Activation::Relu,
                other => return Err(GraphError::UnknownTag { what: "activation", tag: other }),
            };
            let weights = read_tensor(r)?;
            let bias    = read_tensor(r)?;
            Op::FullyConnected { weights, bias, activation }
        }
        OP_SOFTMAX => Op::Softmax,
        other => return Err(GraphError::UnknownTag { what: "op", tag: other }),
    };

    Ok(Node { op, output_quant })
}

fn read_tensor(r: &mut Cursor<&[u8]>) -> Result<ConstTensor, GraphError> {
    let dtype = read(r.read_u8())?;
    let rank  = read(r.read_u8())? as usize;

    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(read(r.read_u32::<LittleEndian>())? as usize);
    }
    let count = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| GraphError::Invalid("tensor element count overflows".into()))?;

    let quant = if dtype == DTYPE_I8 { Some(read_quant(r)?) } else { None };

    let width = match dtype {
        DTYPE_F32 | DTYPE_I32 => 4,
        DTYPE_I8 => 1,
        other => return Err(GraphError::UnknownTag { what: "dtype", tag: other }),
    };

    // Refuse to allocate more than the remaining input could hold
    let remaining = r.get_ref().len() - r.position() as usize;
    if count.checked_mul(width).map_or(true, |n| n > remaining) {
        return Err(GraphError::Truncated);
    }

    let mut raw = vec![0u8; count * width];
    read(r.read_exact(&mut raw))?;

    let data = match (dtype, quant) {
        (DTYPE_F32, _) => TensorData::F32(
            raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        (DTYPE_I32, _) => TensorData::I32(
            raw.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        (_, Some(quant)) => TensorData::I8 {
            values: raw.into_iter().map(|b| b as i8).collect(),
            quant,
        },
        (_, None) => return Err(GraphError::Invalid("int8 tensor without quantization".into())),
    };

    Ok(ConstTensor { shape, data })
}
