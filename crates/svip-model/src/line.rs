//! Parameter curves stored in `LineParam` byte blobs.
//!
//! Layout: an `i32` node count, then `(pos, value)` pairs of little-endian
//! `i32`s, zero-padded to `max(64, next_pow2(len))` bytes.

use std::sync::Arc;

use nrbf_graph::{Object, Value};
use serde::{Deserialize, Serialize};

use crate::error::{SvipError, SvipResult};
use crate::schema::LINE_PARAM;

/// Smallest blob the editor writes.
pub const MIN_BLOB_LEN: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNode {
    pub pos: i32,
    pub value: i32,
}

impl LineNode {
    pub const fn new(pos: i32, value: i32) -> Self {
        Self { pos, value }
    }
}

/// Read the nodes of a blob. Blobs shorter than the count prefix hold no nodes.
pub fn decode_nodes(blob: &[u8]) -> SvipResult<Vec<LineNode>> {
    let Some((head, body)) = blob.split_first_chunk::<4>() else {
        return Ok(Vec::new());
    };
    let count = i32::from_le_bytes(*head);
    let count = usize::try_from(count)
        .map_err(|_| SvipError::InvalidLine(format!("negative node count {count}")))?;
    let needed = count
        .checked_mul(8)
        .filter(|&n| n <= body.len())
        .ok_or_else(|| {
            SvipError::InvalidLine(format!(
                "{count} nodes need {} bytes, blob has {}",
                count.saturating_mul(8),
                body.len()
            ))
        })?;
    Ok(body[..needed]
        .chunks_exact(8)
        .map(|pair| {
            let (pos, value) = pair.split_at(4);
            LineNode::new(read_i32(pos), read_i32(value))
        })
        .collect())
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    i32::from_le_bytes(buf)
}

/// Encode nodes into a padded blob.
pub fn encode_nodes(nodes: &[LineNode]) -> SvipResult<Vec<u8>> {
    let count = node_count(nodes.len())?;
    let len = 4 + nodes.len() * 8;
    let mut blob = Vec::with_capacity(padded_blob_len(len));
    blob.extend_from_slice(&count.to_le_bytes());
    for node in nodes {
        blob.extend_from_slice(&node.pos.to_le_bytes());
        blob.extend_from_slice(&node.value.to_le_bytes());
    }
    blob.resize(padded_blob_len(len), 0);
    Ok(blob)
}

fn node_count(len: usize) -> SvipResult<i32> {
    i32::try_from(len)
        .map_err(|_| SvipError::InvalidLine(format!("{len} nodes exceed the i32 count prefix")))
}

fn padded_blob_len(len: usize) -> usize {
    len.next_power_of_two().max(MIN_BLOB_LEN)
}

/// A `LineParam` object holding `nodes`.
pub fn line_param(nodes: &[LineNode]) -> SvipResult<Arc<Object>> {
    let line = Object::new(&LINE_PARAM).with("line_param", Value::bytes(&encode_nodes(nodes)?))?;
    Ok(line.into_shared())
}

/// Nodes of a `LineParam` object; `None` for a null field.
pub fn line_nodes(value: &Value) -> SvipResult<Option<Vec<LineNode>>> {
    let Some(line) = value.as_object() else {
        return Ok(None);
    };
    let blob = line
        .field("line_param")?
        .as_bytes()
        .ok_or_else(|| SvipError::InvalidLine("line_param is not a byte array".into()))?;
    decode_nodes(&blob).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_curve_pads_to_minimum() {
        let blob = encode_nodes(&[LineNode::new(-192000, 0), LineNode::new(1073741823, 0)]).unwrap();
        assert_eq!(blob.len(), 64);
        assert_eq!(&blob[..4], &2i32.to_le_bytes());
        assert_eq!(&blob[4..8], &(-192000i32).to_le_bytes());
        assert!(blob[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn long_curve_pads_to_power_of_two() {
        let nodes: Vec<_> = (0..10).map(|i| LineNode::new(i * 5, i)).collect();
        // 4 + 80 bytes
        assert_eq!(encode_nodes(&nodes).unwrap().len(), 128);
    }

    #[test]
    fn empty_and_short_blobs() {
        assert_eq!(decode_nodes(&[]).unwrap(), Vec::<LineNode>::new());
        assert_eq!(decode_nodes(&[1, 0]).unwrap(), Vec::<LineNode>::new());
        assert_eq!(decode_nodes(&encode_nodes(&[]).unwrap()).unwrap(), Vec::<LineNode>::new());
    }

    #[test]
    fn bad_counts_are_rejected() {
        assert!(decode_nodes(&(-1i32).to_le_bytes()).is_err());
        let mut blob = 3i32.to_le_bytes().to_vec();
        blob.extend_from_slice(&[0; 8]);
        assert!(matches!(decode_nodes(&blob), Err(SvipError::InvalidLine(_))));
    }

    #[test]
    fn node_count_must_fit_the_prefix() {
        assert_eq!(node_count(3).unwrap(), 3);
        assert_eq!(node_count(i32::MAX as usize).unwrap(), i32::MAX);
        let err = node_count(i32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, SvipError::InvalidLine(_)));
    }

    #[test]
    fn object_helpers() {
        let nodes = vec![LineNode::new(0, 50), LineNode::new(480, 100)];
        let line = line_param(&nodes).unwrap();
        assert_eq!(line_nodes(&Value::Object(line)).unwrap(), Some(nodes));
        assert_eq!(line_nodes(&Value::Null).unwrap(), None);
    }

    proptest! {
        #[test]
        fn nodes_survive_the_blob(raw in prop::collection::vec((any::<i32>(), any::<i32>()), 0..100)) {
            let nodes: Vec<_> = raw.into_iter().map(|(p, v)| LineNode::new(p, v)).collect();
            let blob = encode_nodes(&nodes).unwrap();
            prop_assert!(blob.len().is_power_of_two());
            prop_assert_eq!(decode_nodes(&blob).unwrap(), nodes);
        }
    }
}
