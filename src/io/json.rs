//! Human-readable JSON container.
//!
//! Objects become JSON objects in insertion order and text becomes JSON
//! strings. Arrays are `{"$dtype": .., "$values": [..]}`; blocks of views
//! over one buffer add `"$views": {name: {"count", "offset", "stride"}}`.
//! Non-finite floats are written as the strings `"nan"`, `"inf"` and
//! `"-inf"`. Finite floats are written in shortest round-trip form and read
//! back bit-exact.

use serde_json::{Map, Number, Value};
use std::io::{Read, Write};

use crate::data::buffer::{ArrayData, DType};
use crate::document::Node;
use crate::io::packed::{PackedNode, PackedView};
use crate::io::{DocumentReader, DocumentWriter};
use crate::mesh_error::CheckpointError;

const KEY_DTYPE: &str = "$dtype";
const KEY_VALUES: &str = "$values";
const KEY_VIEWS: &str = "$views";
const NAN: &str = "nan";
const INF: &str = "inf";
const NEG_INF: &str = "-inf";

#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl DocumentWriter for JsonCodec {
    fn write<W: Write>(&self, writer: W, node: &Node) -> Result<(), CheckpointError> {
        let value = to_value(&PackedNode::pack(node)?)?;
        serde_json::to_writer_pretty(writer, &value)
            .map_err(|e| CheckpointError::Encode(e.to_string()))
    }
}

impl DocumentReader for JsonCodec {
    fn read<R: Read>(&self, reader: R) -> Result<Node, CheckpointError> {
        let value: Value = serde_json::from_reader(reader)
            .map_err(|e| CheckpointError::ProtocolMismatch(format!("invalid json: {e}")))?;
        from_value(value)?.unpack()
    }
}

fn to_value(node: &PackedNode) -> Result<Value, CheckpointError> {
    Ok(match node {
        PackedNode::Text(s) => Value::String(s.clone()),
        PackedNode::Object(children) => {
            let mut map = Map::with_capacity(children.len());
            for (name, child) in children {
                if name.starts_with('$') {
                    return Err(CheckpointError::Encode(format!(
                        "child name \"{name}\" is reserved by the json encoding"
                    )));
                }
                map.insert(name.clone(), to_value(child)?);
            }
            Value::Object(map)
        }
        PackedNode::Array(data) => array_value(data),
        PackedNode::Block { data, views } => {
            let mut value = array_value(data);
            let mut placed = Map::with_capacity(views.len());
            for (name, v) in views {
                let mut entry = Map::new();
                entry.insert("count".into(), Value::from(v.count));
                entry.insert("offset".into(), Value::from(v.offset));
                entry.insert("stride".into(), Value::from(v.stride));
                placed.insert(name.clone(), Value::Object(entry));
            }
            if let Value::Object(map) = &mut value {
                map.insert(KEY_VIEWS.into(), Value::Object(placed));
            }
            value
        }
    })
}

fn array_value(data: &ArrayData) -> Value {
    let values: Vec<Value> = match data {
        ArrayData::Int32(v) => v.iter().map(|&x| Value::from(x)).collect(),
        ArrayData::Int64(v) => v.iter().map(|&x| Value::from(x)).collect(),
        ArrayData::Float64(v) => v.iter().map(|&x| float_value(x)).collect(),
    };
    let mut map = Map::with_capacity(2);
    map.insert(KEY_DTYPE.into(), Value::from(data.dtype().name()));
    map.insert(KEY_VALUES.into(), Value::Array(values));
    Value::Object(map)
}

fn float_value(x: f64) -> Value {
    match Number::from_f64(x) {
        Some(n) => Value::Number(n),
        None if x.is_nan() => Value::from(NAN),
        None if x > 0.0 => Value::from(INF),
        None => Value::from(NEG_INF),
    }
}

fn float_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            NAN => Some(f64::NAN),
            INF => Some(f64::INFINITY),
            NEG_INF => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn mismatch(msg: impl Into<String>) -> CheckpointError {
    CheckpointError::ProtocolMismatch(msg.into())
}

fn from_value(value: Value) -> Result<PackedNode, CheckpointError> {
    match value {
        Value::String(s) => Ok(PackedNode::Text(s)),
        Value::Object(mut map) => {
            let Some(dtype) = map.remove(KEY_DTYPE) else {
                return Ok(PackedNode::Object(
                    map.into_iter()
                        .map(|(name, child)| Ok((name, from_value(child)?)))
                        .collect::<Result<_, CheckpointError>>()?,
                ));
            };
            let dtype = dtype
                .as_str()
                .and_then(DType::from_name)
                .ok_or_else(|| mismatch(format!("unknown dtype {dtype}")))?;
            let values = match map.remove(KEY_VALUES) {
                Some(Value::Array(values)) => values,
                _ => return Err(mismatch("array without \"$values\"")),
            };
            let data = array_data(dtype, values)?;
            match map.remove(KEY_VIEWS) {
                None => Ok(PackedNode::Array(data)),
                Some(Value::Object(views)) => {
                    let views = views
                        .into_iter()
                        .map(|(name, v)| Ok((name, packed_view(&v)?)))
                        .collect::<Result<_, CheckpointError>>()?;
                    Ok(PackedNode::Block { data, views })
                }
                Some(other) => Err(mismatch(format!("malformed \"$views\": {other}"))),
            }
        }
        other => Err(mismatch(format!("unexpected json value {other}"))),
    }
}

fn array_data(dtype: DType, values: Vec<Value>) -> Result<ArrayData, CheckpointError> {
    let bad = |v: &Value| mismatch(format!("value {v} is not {}", dtype.name()));
    Ok(match dtype {
        DType::Int32 => ArrayData::Int32(
            values
                .iter()
                .map(|v| v.as_i64().and_then(|x| i32::try_from(x).ok()).ok_or_else(|| bad(v)))
                .collect::<Result<_, _>>()?,
        ),
        DType::Int64 => ArrayData::Int64(
            values
                .iter()
                .map(|v| v.as_i64().ok_or_else(|| bad(v)))
                .collect::<Result<_, _>>()?,
        ),
        DType::Float64 => ArrayData::Float64(
            values
                .iter()
                .map(|v| float_of(v).ok_or_else(|| bad(v)))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn packed_view(v: &Value) -> Result<PackedView, CheckpointError> {
    let field = |key: &str| {
        v.get(key)
            .and_then(Value::as_u64)
            .ok_or_else(|| mismatch(format!("view is missing \"{key}\"")))
    };
    Ok(PackedView {
        count: field("count")?,
        offset: field("offset")?,
        stride: field("stride")?,
    })
}
