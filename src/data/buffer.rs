//! Shared, typed array buffers.
//!
//! A [`SharedBuffer`] is the unit of memory that document views and native
//! mesh/field storage point into. Ownership is explicit: a
//! [`BufferHandle::Owned`] keeps the buffer alive, a
//! [`BufferHandle::External`] is a non-owning alias whose validity is bounded
//! by whoever owns the buffer. Reads through a dead alias fail with
//! [`CheckpointError::DanglingAlias`].

use core::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::mesh_error::CheckpointError;

/// Element type of an array buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Int32,
    Int64,
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            DType::Int32 => 4,
            DType::Int64 | DType::Float64 => 8,
        }
    }

    /// Name used by the document encodings.
    pub const fn name(self) -> &'static str {
        match self {
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            "float64" => Some(DType::Float64),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }
}

/// Typed contiguous storage behind a [`SharedBuffer`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
}

impl ArrayData {
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Int32(_) => DType::Int32,
            ArrayData::Int64(_) => DType::Int64,
            ArrayData::Float64(_) => DType::Float64,
        }
    }

    /// Length in elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype().size()
    }

    /// Element `i` widened to `f64`.
    #[inline]
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        match self {
            ArrayData::Int32(v) => v.get(i).map(|&x| f64::from(x)),
            ArrayData::Int64(v) => v.get(i).map(|&x| x as f64),
            ArrayData::Float64(v) => v.get(i).copied(),
        }
    }

    /// Element `i` as `i64`; `None` for floats and out-of-range indices.
    #[inline]
    pub fn get_i64(&self, i: usize) -> Option<i64> {
        match self {
            ArrayData::Int32(v) => v.get(i).map(|&x| i64::from(x)),
            ArrayData::Int64(v) => v.get(i).copied(),
            ArrayData::Float64(_) => None,
        }
    }

    /// Copy of the element range `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Option<ArrayData> {
        Some(match self {
            ArrayData::Int32(v) => ArrayData::Int32(v.get(start..end)?.to_vec()),
            ArrayData::Int64(v) => ArrayData::Int64(v.get(start..end)?.to_vec()),
            ArrayData::Float64(v) => ArrayData::Float64(v.get(start..end)?.to_vec()),
        })
    }

    pub fn as_f64(&self) -> Result<&[f64], CheckpointError> {
        match self {
            ArrayData::Float64(v) => Ok(v),
            other => Err(CheckpointError::TypeMismatch {
                expected: DType::Float64,
                found: other.dtype(),
            }),
        }
    }

    pub fn as_f64_mut(&mut self) -> Result<&mut [f64], CheckpointError> {
        match self {
            ArrayData::Float64(v) => Ok(v),
            other => Err(CheckpointError::TypeMismatch {
                expected: DType::Float64,
                found: other.dtype(),
            }),
        }
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(v: Vec<f64>) -> Self {
        ArrayData::Float64(v)
    }
}

impl From<Vec<i32>> for ArrayData {
    fn from(v: Vec<i32>) -> Self {
        ArrayData::Int32(v)
    }
}

impl From<Vec<i64>> for ArrayData {
    fn from(v: Vec<i64>) -> Self {
        ArrayData::Int64(v)
    }
}

/// Reference-counted, lock-protected typed buffer.
///
/// Cloning a `SharedBuffer` clones the strong handle, not the data; use
/// [`SharedBuffer::deep_copy`] for an independent buffer.
#[derive(Clone)]
pub struct SharedBuffer(Arc<RwLock<ArrayData>>);

impl Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        f.debug_struct("SharedBuffer")
            .field("dtype", &data.dtype())
            .field("len", &data.len())
            .finish()
    }
}

impl SharedBuffer {
    pub fn new(data: impl Into<ArrayData>) -> Self {
        Self(Arc::new(RwLock::new(data.into())))
    }

    pub fn dtype(&self) -> DType {
        self.0.read().dtype()
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, ArrayData> {
        self.0.read()
    }

    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, ArrayData> {
        self.0.write()
    }

    /// Non-owning alias of this buffer.
    pub fn downgrade(&self) -> WeakBuffer {
        WeakBuffer(Arc::downgrade(&self.0))
    }

    /// Independent buffer holding a copy of the current contents.
    pub fn deep_copy(&self) -> SharedBuffer {
        SharedBuffer::new(self.0.read().clone())
    }

    /// Identity of the underlying allocation.
    #[inline]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// Non-owning alias of a [`SharedBuffer`].
#[derive(Clone)]
pub struct WeakBuffer(Weak<RwLock<ArrayData>>);

impl Debug for WeakBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBuffer")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

impl WeakBuffer {
    pub fn upgrade(&self) -> Result<SharedBuffer, CheckpointError> {
        self.0
            .upgrade()
            .map(SharedBuffer)
            .ok_or(CheckpointError::DanglingAlias)
    }

    #[inline]
    pub fn id(&self) -> usize {
        Weak::as_ptr(&self.0) as *const () as usize
    }
}

/// Owning or aliasing reference to a buffer.
#[derive(Clone, Debug)]
pub enum BufferHandle {
    /// Keeps the buffer alive.
    Owned(SharedBuffer),
    /// Borrows memory owned elsewhere; never extends its lifetime.
    External(WeakBuffer),
}

impl BufferHandle {
    /// Strong handle for the duration of an access.
    pub fn resolve(&self) -> Result<SharedBuffer, CheckpointError> {
        match self {
            BufferHandle::Owned(buf) => Ok(buf.clone()),
            BufferHandle::External(weak) => weak.upgrade(),
        }
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        matches!(self, BufferHandle::External(_))
    }

    /// Non-owning handle to the same memory.
    pub fn alias(&self) -> BufferHandle {
        match self {
            BufferHandle::Owned(buf) => BufferHandle::External(buf.downgrade()),
            BufferHandle::External(weak) => BufferHandle::External(weak.clone()),
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        match self {
            BufferHandle::Owned(buf) => buf.id(),
            BufferHandle::External(weak) => weak.id(),
        }
    }

    /// `true` when both handles point at the same allocation.
    pub fn same_buffer(&self, other: &BufferHandle) -> bool {
        self.id() == other.id()
    }
}

impl From<SharedBuffer> for BufferHandle {
    fn from(buf: SharedBuffer) -> Self {
        BufferHandle::Owned(buf)
    }
}
