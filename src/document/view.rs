//! Typed, strided array views: the leaves of a document tree.

use num_traits::NumCast;

use crate::data::buffer::{ArrayData, BufferHandle, DType, SharedBuffer};
use crate::mesh_error::CheckpointError;

/// `count` elements of `dtype`, the first at byte `offset`, each `stride`
/// bytes apart, inside the buffer behind `buffer`.
///
/// Construction validates that every addressed element lies inside the
/// buffer, so reads never go out of bounds afterwards (unless the alias
/// target was dropped, which reports [`CheckpointError::DanglingAlias`]).
#[derive(Clone, Debug)]
pub struct ArrayView {
    dtype: DType,
    count: usize,
    offset: usize,
    stride: usize,
    buffer: BufferHandle,
}

impl ArrayView {
    /// Compact view owning `data`.
    pub fn owned(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        let dtype = data.dtype();
        Self {
            dtype,
            count: data.len(),
            offset: 0,
            stride: dtype.size(),
            buffer: BufferHandle::Owned(SharedBuffer::new(data)),
        }
    }

    /// Non-owning view of `buffer`.
    pub fn external(
        buffer: &SharedBuffer,
        count: usize,
        offset: usize,
        stride: usize,
    ) -> Result<Self, CheckpointError> {
        Self::over(BufferHandle::External(buffer.downgrade()), count, offset, stride)
    }

    /// View over any handle; the handle's ownership is kept as-is.
    pub fn over(
        buffer: BufferHandle,
        count: usize,
        offset: usize,
        stride: usize,
    ) -> Result<Self, CheckpointError> {
        let resolved = buffer.resolve()?;
        let data = resolved.read();
        let dtype = data.dtype();
        let size = dtype.size();
        let invalid = |reason| CheckpointError::InvalidView {
            reason,
            count,
            offset,
            stride,
            buffer_len: data.byte_len(),
        };
        if offset % size != 0 {
            return Err(invalid("offset is not a multiple of the element size"));
        }
        if stride < size || stride % size != 0 {
            return Err(invalid("stride is not a positive multiple of the element size"));
        }
        if count > 0 {
            let last_end = (count - 1)
                .checked_mul(stride)
                .and_then(|x| x.checked_add(offset))
                .and_then(|x| x.checked_add(size));
            if last_end.is_none_or(|end| end > data.byte_len()) {
                return Err(invalid("view addresses memory past the end of its buffer"));
            }
        }
        drop(data);
        Ok(Self {
            dtype,
            count,
            offset,
            stride,
            buffer,
        })
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements addressed.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Byte offset of the first element.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte distance between consecutive elements.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn handle(&self) -> &BufferHandle {
        &self.buffer
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.buffer.is_external()
    }

    /// `true` when elements are adjacent in memory.
    #[inline]
    pub fn is_compact(&self) -> bool {
        self.stride == self.dtype.size()
    }

    /// Buffer element index of the first value.
    #[inline]
    pub fn first_index(&self) -> usize {
        self.offset / self.dtype.size()
    }

    /// Buffer elements between consecutive values.
    #[inline]
    pub fn step(&self) -> usize {
        self.stride / self.dtype.size()
    }

    /// Buffer element index of value `i`.
    #[inline]
    pub fn element_index(&self, i: usize) -> usize {
        self.first_index() + i * self.step()
    }

    pub fn buffer(&self) -> Result<SharedBuffer, CheckpointError> {
        self.buffer.resolve()
    }

    /// Compact copy of the addressed elements in their stored type.
    pub fn to_data(&self) -> Result<ArrayData, CheckpointError> {
        let buffer = self.buffer.resolve()?;
        let data = buffer.read();
        let idx = (0..self.count).map(|i| self.element_index(i));
        Ok(match &*data {
            ArrayData::Int32(v) => ArrayData::Int32(idx.map(|k| v[k]).collect()),
            ArrayData::Int64(v) => ArrayData::Int64(idx.map(|k| v[k]).collect()),
            ArrayData::Float64(v) => ArrayData::Float64(idx.map(|k| v[k]).collect()),
        })
    }

    /// Owned, compact copy of this view.
    pub fn compact(&self) -> Result<ArrayView, CheckpointError> {
        Ok(ArrayView::owned(self.to_data()?))
    }

    /// Values widened to `f64`.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, CheckpointError> {
        let buffer = self.buffer.resolve()?;
        let data = buffer.read();
        Ok((0..self.count)
            .map(|i| data.get_f64(self.element_index(i)).unwrap_or_default())
            .collect())
    }

    /// Values converted to `i32`, failing on floats and on values that do
    /// not fit.
    pub fn to_i32_vec(&self) -> Result<Vec<i32>, CheckpointError> {
        self.to_int_vec::<i32>()
    }

    pub fn to_i64_vec(&self) -> Result<Vec<i64>, CheckpointError> {
        self.to_int_vec::<i64>()
    }

    fn to_int_vec<T: NumCast>(&self) -> Result<Vec<T>, CheckpointError> {
        if !self.dtype.is_integer() {
            return Err(CheckpointError::TypeMismatch {
                expected: DType::Int32,
                found: self.dtype,
            });
        }
        let buffer = self.buffer.resolve()?;
        let data = buffer.read();
        (0..self.count)
            .map(|i| {
                let raw = data.get_i64(self.element_index(i)).unwrap_or_default();
                T::from(raw).ok_or_else(|| CheckpointError::ValueOutOfRange {
                    index: i,
                    value: raw.to_string(),
                })
            })
            .collect()
    }

    /// Single integer value (a one-element integer array).
    pub fn scalar_i64(&self) -> Result<i64, CheckpointError> {
        match self.to_i64_vec()?.as_slice() {
            [v] => Ok(*v),
            _ => Err(CheckpointError::Schema(format!(
                "expected a scalar, found {} values",
                self.count
            ))),
        }
    }

    /// Single value widened to `f64`.
    pub fn scalar_f64(&self) -> Result<f64, CheckpointError> {
        match self.to_f64_vec()?.as_slice() {
            [v] => Ok(*v),
            _ => Err(CheckpointError::Schema(format!(
                "expected a scalar, found {} values",
                self.count
            ))),
        }
    }
}
