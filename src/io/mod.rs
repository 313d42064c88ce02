//! Document containers and checkpoint file I/O.
//!
//! This module provides trait-based readers and writers that turn a
//! [`Node`] into bytes of a named container encoding ([`Protocol`]) and
//! back, plus the per-domain and root-index file helpers built on them.

pub mod binary;
pub mod domain;
pub mod json;
pub mod layout;
mod packed;
pub mod root;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::algs::wire::FileHeader;
use crate::document::Node;
use crate::mesh_error::CheckpointError;

pub use binary::BinaryCodec;
pub use json::JsonCodec;
pub use layout::FileLayout;

/// Trait for readers that parse a document from a byte stream.
pub trait DocumentReader {
    fn read<R: Read>(&self, reader: R) -> Result<Node, CheckpointError>;
}

/// Trait for writers that serialize a document to a byte stream.
pub trait DocumentWriter {
    fn write<W: Write>(&self, writer: W, node: &Node) -> Result<(), CheckpointError>;
}

/// Named container encoding of documents. The name doubles as the domain
/// file extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Human-readable JSON.
    #[default]
    #[serde(rename = "json")]
    Json,
    /// Compact binary.
    #[serde(rename = "bin")]
    Binary,
}

impl Protocol {
    pub const fn name(self) -> &'static str {
        match self {
            Protocol::Json => "json",
            Protocol::Binary => "bin",
        }
    }

    #[inline]
    pub const fn is_binary(self) -> bool {
        matches!(self, Protocol::Binary)
    }

    /// Encoding of the root index written alongside domains of this
    /// encoding: JSON, unless the domains are binary.
    pub const fn root_protocol(self) -> Protocol {
        if self.is_binary() {
            Protocol::Binary
        } else {
            Protocol::Json
        }
    }

    pub fn encode(self, node: &Node) -> Result<Vec<u8>, CheckpointError> {
        let mut out = Vec::new();
        match self {
            Protocol::Json => JsonCodec.write(&mut out, node)?,
            Protocol::Binary => BinaryCodec.write(&mut out, node)?,
        }
        Ok(out)
    }

    pub fn decode(self, bytes: &[u8]) -> Result<Node, CheckpointError> {
        match self {
            Protocol::Json => JsonCodec.read(bytes),
            Protocol::Binary => BinaryCodec.read(bytes),
        }
    }

    /// Encoding of `bytes`, judged by the binary header.
    pub fn detect(bytes: &[u8]) -> Protocol {
        if FileHeader::split(bytes).is_some() {
            Protocol::Binary
        } else {
            Protocol::Json
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Protocol::Json),
            "bin" => Ok(Protocol::Binary),
            other => Err(CheckpointError::ProtocolMismatch(format!(
                "unknown protocol \"{other}\" (expected \"json\" or \"bin\")"
            ))),
        }
    }
}
