//! `f64` windows into shared buffers.
//!
//! Native vertex coordinates and grid-function values live in a [`Slab`]:
//! `len` consecutive `f64` elements starting at `offset` inside a
//! [`SharedBuffer`]. A slab over an [`BufferHandle::External`] handle is a
//! zero-copy alias of memory owned by someone else.

use crate::data::buffer::{BufferHandle, DType, SharedBuffer};
use crate::mesh_error::CheckpointError;

#[derive(Clone, Debug)]
pub struct Slab {
    handle: BufferHandle,
    offset: usize,
    len: usize,
}

impl Slab {
    /// Owned slab over a fresh buffer.
    pub fn owned(values: Vec<f64>) -> Self {
        let len = values.len();
        Self {
            handle: BufferHandle::Owned(SharedBuffer::new(values)),
            offset: 0,
            len,
        }
    }

    /// Slab over `handle`, validated against the buffer's type and length.
    pub fn from_handle(
        handle: BufferHandle,
        offset: usize,
        len: usize,
    ) -> Result<Self, CheckpointError> {
        let buffer = handle.resolve()?;
        let data = buffer.read();
        if data.dtype() != DType::Float64 {
            return Err(CheckpointError::TypeMismatch {
                expected: DType::Float64,
                found: data.dtype(),
            });
        }
        let end = offset.checked_add(len);
        if end.is_none_or(|end| end > data.len()) {
            return Err(CheckpointError::InvalidView {
                reason: "slab exceeds buffer",
                count: len,
                offset,
                stride: 1,
                buffer_len: data.len(),
            });
        }
        drop(data);
        Ok(Self {
            handle,
            offset,
            len,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element offset of the first value inside the buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn handle(&self) -> &BufferHandle {
        &self.handle
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.handle.is_external()
    }

    /// Run `f` over the values.
    pub fn with<R>(&self, f: impl FnOnce(&[f64]) -> R) -> Result<R, CheckpointError> {
        let buffer = self.handle.resolve()?;
        let data = buffer.read();
        let values = data.as_f64()?;
        Ok(f(&values[self.offset..self.offset + self.len]))
    }

    /// Run `f` over the values mutably. Writes are visible to every alias.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [f64]) -> R) -> Result<R, CheckpointError> {
        let buffer = self.handle.resolve()?;
        let mut data = buffer.write();
        let values = data.as_f64_mut()?;
        Ok(f(&mut values[self.offset..self.offset + self.len]))
    }

    pub fn get(&self, i: usize) -> Result<f64, CheckpointError> {
        if i >= self.len {
            return Err(CheckpointError::InvalidView {
                reason: "index past end of slab",
                count: self.len,
                offset: i,
                stride: 1,
                buffer_len: self.len,
            });
        }
        self.with(|v| v[i])
    }

    pub fn to_vec(&self) -> Result<Vec<f64>, CheckpointError> {
        self.with(|v| v.to_vec())
    }

    /// Independent owned copy of the values.
    pub fn deep_copy(&self) -> Result<Slab, CheckpointError> {
        Ok(Slab::owned(self.to_vec()?))
    }

    /// Same values, owned. Owned slabs are returned unchanged.
    pub fn into_owned(self) -> Result<Slab, CheckpointError> {
        if self.is_external() {
            self.deep_copy()
        } else {
            Ok(self)
        }
    }

    /// Non-owning slab over the same memory.
    pub fn alias(&self) -> Slab {
        Slab {
            handle: self.handle.alias(),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl From<Vec<f64>> for Slab {
    fn from(values: Vec<f64>) -> Self {
        Slab::owned(values)
    }
}
