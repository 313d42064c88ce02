//! Fixed, versioned, little-endian wire types for checkpoint exchange.

use bytemuck::{Pod, Zeroable};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Magic prefix of binary-encoded documents.
pub const BINARY_MAGIC: [u8; 4] = *b"MCKP";

// All multi-byte integers in these structs are little-endian on the wire.
// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

/// Length prefix of a broadcast payload. Zero means the sender failed.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireLen {
    pub len_le: u64,
}

impl WireLen {
    pub const SIZE: usize = std::mem::size_of::<WireLen>();

    pub fn new(n: usize) -> Self {
        Self {
            len_le: (n as u64).to_le(),
        }
    }

    pub fn get(&self) -> u64 {
        u64::from_le(self.len_le)
    }

    /// Decode from exactly [`WireLen::SIZE`] bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, String> {
        expect_exact_len(buf.len(), Self::SIZE)?;
        Ok(bytemuck::pod_read_unaligned(buf))
    }
}

/// Header in front of a binary document file.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version_le: u16,
    pub reserved_le: u16, // future use; keep zero
}

impl FileHeader {
    pub const SIZE: usize = std::mem::size_of::<FileHeader>();

    pub fn new() -> Self {
        Self {
            magic: BINARY_MAGIC,
            version_le: WIRE_VERSION.to_le(),
            reserved_le: 0,
        }
    }

    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }

    /// Split `bytes` into a header and the remaining payload, if `bytes`
    /// starts with the binary magic.
    pub fn split(bytes: &[u8]) -> Option<(FileHeader, &[u8])> {
        if bytes.len() < Self::SIZE || bytes[..4] != BINARY_MAGIC {
            return None;
        }
        let hdr: FileHeader = bytemuck::pod_read_unaligned(&bytes[..Self::SIZE]);
        Some((hdr, &bytes[Self::SIZE..]))
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
