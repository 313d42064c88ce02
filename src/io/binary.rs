//! Compact binary container: a [`FileHeader`] followed by the `bincode`
//! image of the packed document.

use std::io::{Read, Write};

use crate::algs::wire::{FileHeader, WIRE_VERSION, cast_slice};
use crate::document::Node;
use crate::io::packed::PackedNode;
use crate::io::{DocumentReader, DocumentWriter};
use crate::mesh_error::CheckpointError;

#[derive(Debug, Default, Clone)]
pub struct BinaryCodec;

impl DocumentWriter for BinaryCodec {
    fn write<W: Write>(&self, mut writer: W, node: &Node) -> Result<(), CheckpointError> {
        let packed = PackedNode::pack(node)?;
        let header = FileHeader::new();
        writer.write_all(cast_slice(std::slice::from_ref(&header)))?;
        bincode::serialize_into(&mut writer, &packed)
            .map_err(|e| CheckpointError::Encode(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

impl DocumentReader for BinaryCodec {
    fn read<R: Read>(&self, mut reader: R) -> Result<Node, CheckpointError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let (header, payload) = FileHeader::split(&bytes).ok_or_else(|| {
            CheckpointError::ProtocolMismatch("missing binary document header".into())
        })?;
        if header.version() != WIRE_VERSION {
            return Err(CheckpointError::ProtocolMismatch(format!(
                "binary document version {} is not supported (expected {WIRE_VERSION})",
                header.version()
            )));
        }
        let packed: PackedNode = bincode::deserialize(payload)
            .map_err(|e| CheckpointError::ProtocolMismatch(format!("corrupt binary document: {e}")))?;
        packed.unpack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::buffer::SharedBuffer;
    use crate::document::ArrayView;

    #[test]
    fn binary_round_trip_preserves_strided_layout() {
        let buf = SharedBuffer::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut n = Node::object();
        n.set("coords/type", "explicit");
        n.set("coords/values/x", ArrayView::external(&buf, 2, 0, 24).unwrap());
        n.set("coords/values/y", ArrayView::external(&buf, 2, 8, 24).unwrap());
        n.set("coords/values/z", ArrayView::external(&buf, 2, 16, 24).unwrap());

        let mut bytes = Vec::new();
        BinaryCodec.write(&mut bytes, &n).unwrap();
        assert_eq!(&bytes[..4], b"MCKP");

        let back = BinaryCodec.read(bytes.as_slice()).unwrap();
        assert!(back.same_content(&n).unwrap());
        let y = back.array("coords/values/y").unwrap();
        assert_eq!((y.offset(), y.stride()), (8, 24));
    }

    #[test]
    fn json_bytes_are_not_binary() {
        let err = BinaryCodec.read(&b"{}"[..]).unwrap_err();
        assert!(matches!(err, CheckpointError::ProtocolMismatch(_)));
    }
}
