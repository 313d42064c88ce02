//! Layout-preserving intermediate form shared by every encoding.
//!
//! Arrays are written compact. An object whose children are all views into
//! one buffer (a multi-component array such as `coordsets/coords/values` or
//! a vector field's `values`) is written once as a block: the covering range
//! of the buffer plus each child's count/offset/stride rebased onto it. This
//! keeps interleaved and blocked layouts intact across save and load.

use serde::{Deserialize, Serialize};

use crate::data::buffer::{ArrayData, BufferHandle, SharedBuffer};
use crate::document::{ArrayView, Node, shared_buffer_of};
use crate::mesh_error::CheckpointError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum PackedNode {
    Object(Vec<(String, PackedNode)>),
    Text(String),
    Array(ArrayData),
    Block {
        data: ArrayData,
        views: Vec<(String, PackedView)>,
    },
}

/// Placement of one child inside a block, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PackedView {
    pub count: u64,
    pub offset: u64,
    pub stride: u64,
}

impl PackedNode {
    pub(crate) fn pack(node: &Node) -> Result<Self, CheckpointError> {
        match node {
            Node::Text(s) => Ok(PackedNode::Text(s.clone())),
            Node::Array(view) => Ok(PackedNode::Array(view.to_data()?)),
            Node::Object(children) => {
                if children.len() >= 2 {
                    if let Some(block) = pack_block(node)? {
                        return Ok(block);
                    }
                }
                let packed = children
                    .iter()
                    .map(|(name, child)| Ok((name.clone(), PackedNode::pack(child)?)))
                    .collect::<Result<_, CheckpointError>>()?;
                Ok(PackedNode::Object(packed))
            }
        }
    }

    pub(crate) fn unpack(self) -> Result<Node, CheckpointError> {
        match self {
            PackedNode::Text(s) => Ok(Node::Text(s)),
            PackedNode::Array(data) => Ok(Node::Array(ArrayView::owned(data))),
            PackedNode::Object(children) => Ok(Node::Object(
                children
                    .into_iter()
                    .map(|(name, child)| Ok((name, child.unpack()?)))
                    .collect::<Result<_, CheckpointError>>()?,
            )),
            PackedNode::Block { data, views } => {
                let buffer = SharedBuffer::new(data);
                let children = views
                    .into_iter()
                    .map(|(name, v)| {
                        let view = ArrayView::over(
                            BufferHandle::Owned(buffer.clone()),
                            to_usize(v.count)?,
                            to_usize(v.offset)?,
                            to_usize(v.stride)?,
                        )?;
                        Ok((name, Node::Array(view)))
                    })
                    .collect::<Result<_, CheckpointError>>()?;
                Ok(Node::Object(children))
            }
        }
    }
}

fn to_usize(v: u64) -> Result<usize, CheckpointError> {
    usize::try_from(v).map_err(|_| CheckpointError::ProtocolMismatch(format!("size {v} overflows")))
}

fn pack_block(node: &Node) -> Result<Option<PackedNode>, CheckpointError> {
    let Some(handle) = shared_buffer_of(node) else {
        return Ok(None);
    };
    let views: Vec<(&str, &ArrayView)> = node
        .children()
        .filter_map(|(name, child)| child.as_array().map(|v| (name, v)))
        .collect();
    if views.iter().any(|(_, v)| v.count() == 0) {
        return Ok(None);
    }
    let start = views.iter().map(|(_, v)| v.first_index()).min().unwrap_or(0);
    let end = views
        .iter()
        .map(|(_, v)| v.element_index(v.count() - 1) + 1)
        .max()
        .unwrap_or(0);

    let buffer = handle.resolve()?;
    let data = buffer.read();
    let size = data.dtype().size();
    let Some(window) = data.slice(start, end) else {
        return Ok(None);
    };
    let placed = views
        .iter()
        .map(|(name, v)| {
            (
                name.to_string(),
                PackedView {
                    count: v.count() as u64,
                    offset: (v.offset() - start * size) as u64,
                    stride: v.stride() as u64,
                },
            )
        })
        .collect();
    Ok(Some(PackedNode::Block {
        data: window,
        views: placed,
    }))
}
