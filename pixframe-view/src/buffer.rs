//! Owned sample storage, one `Vec` variant per [`DataType`].

use num_complex::{Complex32, Complex64};

use crate::sample::{DataType, Sample};

/// Type-erased sample storage backing an [`crate::Image`].
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    Bin(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    C32(Vec<Complex32>),
    C64(Vec<Complex64>),
}

impl SampleBuffer {
    /// Zero-initialized buffer of `len` samples.
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        crate::dispatch_sample_type!(data_type, T => T::into_buffer(vec![T::default(); len]))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            SampleBuffer::Bin(_) => DataType::Bin,
            SampleBuffer::U8(_) => DataType::U8,
            SampleBuffer::U16(_) => DataType::U16,
            SampleBuffer::U32(_) => DataType::U32,
            SampleBuffer::U64(_) => DataType::U64,
            SampleBuffer::I8(_) => DataType::I8,
            SampleBuffer::I16(_) => DataType::I16,
            SampleBuffer::I32(_) => DataType::I32,
            SampleBuffer::I64(_) => DataType::I64,
            SampleBuffer::F32(_) => DataType::F32,
            SampleBuffer::F64(_) => DataType::F64,
            SampleBuffer::C32(_) => DataType::C32,
            SampleBuffer::C64(_) => DataType::C64,
        }
    }

    pub fn len(&self) -> usize {
        crate::dispatch_sample_type!(self.data_type(), T => T::slice(self).map_or(0, |s| s.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed access, `None` when `T` does not match the stored type.
    pub fn as_slice<T: Sample>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn as_mut_slice<T: Sample>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }
}
