//! Data module: shared buffers and `f64` slabs

pub mod buffer;
pub mod slab;

pub use buffer::{ArrayData, BufferHandle, DType, SharedBuffer, WeakBuffer};
pub use slab::Slab;
