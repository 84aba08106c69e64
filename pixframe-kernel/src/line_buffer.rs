//! Stride-aware line views and the per-thread staging that feeds them.
//!
//! Line filters never see raw pointers: they receive an [`InLine`] or
//! [`OutLine`] describing `length` pixels of `tensor_elements` samples each.
//! When an image's sample type differs from the filter's, or when an input
//! aliases the output, lines are staged through a thread-owned buffer that
//! converts on the way in and out.

use std::marker::PhantomData;

use pixframe_view::{convert, dispatch_sample_type, FrameError, Image, Sample};

use crate::threading::SendPtr;
use crate::Result;

// ============================================================================
// Line views
// ============================================================================

/// Read-only line of samples handed to a line filter.
pub struct InLine<'a, T> {
    ptr: *const T,
    length: usize,
    stride: isize,
    tensor_elements: usize,
    tensor_stride: isize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: Copy> InLine<'a, T> {
    /// Contiguous line over a slice holding `tensor_elements` samples per pixel.
    pub fn from_slice(data: &'a [T], tensor_elements: usize) -> Self {
        let tensor_elements = tensor_elements.max(1);
        Self {
            ptr: data.as_ptr(),
            length: data.len() / tensor_elements,
            stride: tensor_elements as isize,
            tensor_elements,
            tensor_stride: 1,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// Every sample `ptr + i * stride + t * tensor_stride` for `i < length`,
    /// `t < tensor_elements` must be readable for `'a`.
    pub(crate) unsafe fn from_raw(
        ptr: *const T,
        length: usize,
        stride: isize,
        tensor_elements: usize,
        tensor_stride: isize,
    ) -> Self {
        Self {
            ptr,
            length,
            stride,
            tensor_elements,
            tensor_stride,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn tensor_elements(&self) -> usize {
        self.tensor_elements
    }

    /// First tensor element of pixel `i`.
    #[inline]
    pub fn get(&self, i: usize) -> T {
        self.get_tensor(i, 0)
    }

    #[inline]
    pub fn get_tensor(&self, i: usize, t: usize) -> T {
        assert!(i < self.length && t < self.tensor_elements, "line index out of bounds");
        // SAFETY: in range per construction contract.
        unsafe {
            *self
                .ptr
                .offset(i as isize * self.stride + t as isize * self.tensor_stride)
        }
    }
}

/// Writable line of samples handed to a line filter.
pub struct OutLine<'a, T> {
    ptr: *mut T,
    length: usize,
    stride: isize,
    tensor_elements: usize,
    tensor_stride: isize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T: Copy> OutLine<'a, T> {
    pub fn from_slice(data: &'a mut [T], tensor_elements: usize) -> Self {
        let tensor_elements = tensor_elements.max(1);
        Self {
            ptr: data.as_mut_ptr(),
            length: data.len() / tensor_elements,
            stride: tensor_elements as isize,
            tensor_elements,
            tensor_stride: 1,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// Every sample addressed by the line must be writable for `'a` and not
    /// accessed by anyone else meanwhile.
    pub(crate) unsafe fn from_raw(
        ptr: *mut T,
        length: usize,
        stride: isize,
        tensor_elements: usize,
        tensor_stride: isize,
    ) -> Self {
        Self {
            ptr,
            length,
            stride,
            tensor_elements,
            tensor_stride,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn tensor_elements(&self) -> usize {
        self.tensor_elements
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: T) {
        self.set_tensor(i, 0, value);
    }

    #[inline]
    pub fn set_tensor(&mut self, i: usize, t: usize, value: T) {
        assert!(i < self.length && t < self.tensor_elements, "line index out of bounds");
        // SAFETY: in range per construction contract.
        unsafe {
            *self
                .ptr
                .offset(i as isize * self.stride + t as isize * self.tensor_stride) = value;
        }
    }

    #[inline]
    pub fn get_tensor(&self, i: usize, t: usize) -> T {
        assert!(i < self.length && t < self.tensor_elements, "line index out of bounds");
        // SAFETY: in range per construction contract.
        unsafe {
            *self
                .ptr
                .offset(i as isize * self.stride + t as isize * self.tensor_stride)
        }
    }
}

// ============================================================================
// Converting readers / writers
// ============================================================================

/// Geometry of one line inside an image.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineGeometry {
    pub(crate) offset: isize,
    pub(crate) stride: isize,
    pub(crate) length: usize,
    pub(crate) tensor_elements: usize,
    pub(crate) tensor_stride: isize,
}

impl LineGeometry {
    #[inline]
    fn index(&self, i: usize, t: usize) -> isize {
        self.offset + i as isize * self.stride + t as isize * self.tensor_stride
    }
}

pub(crate) trait ReadLine<T>: Send + Sync {
    /// # Safety
    /// The geometry must address valid samples of the source.
    unsafe fn read(&self, geometry: LineGeometry, dest: &mut [T]);
}

pub(crate) trait WriteLine<T>: Send + Sync {
    /// # Safety
    /// The geometry must address valid, exclusively owned samples.
    unsafe fn write(&self, geometry: LineGeometry, src: &[T]);
}

struct Converter<S> {
    origin: SendPtr<S>,
}

impl<S: Sample, T: Sample> ReadLine<T> for Converter<S> {
    unsafe fn read(&self, g: LineGeometry, dest: &mut [T]) {
        let origin = self.origin.as_const();
        for i in 0..g.length {
            for t in 0..g.tensor_elements {
                dest[i * g.tensor_elements + t] = convert::<S, T>(*origin.offset(g.index(i, t)));
            }
        }
    }
}

impl<S: Sample, T: Sample> WriteLine<T> for Converter<S> {
    unsafe fn write(&self, g: LineGeometry, src: &[T]) {
        let origin = self.origin.as_ptr();
        for i in 0..g.length {
            for t in 0..g.tensor_elements {
                *origin.offset(g.index(i, t)) = convert::<T, S>(src[i * g.tensor_elements + t]);
            }
        }
    }
}

/// Where a line filter's input samples come from.
pub(crate) enum LineSource<T> {
    Direct(SendPtr<T>),
    Staged(Box<dyn ReadLine<T>>),
}

impl<T: Sample> LineSource<T> {
    /// Read from `image`, staging when its type differs from `T` or when
    /// `force_staging` is set.
    pub(crate) fn new(image: &Image, force_staging: bool) -> Result<Self> {
        let dt = image.data_type();
        if !dt.converts_to(T::DATA_TYPE) {
            return Err(FrameError::UnsupportedConversion {
                from: dt,
                to: T::DATA_TYPE,
            });
        }
        if dt == T::DATA_TYPE && !force_staging {
            return Ok(LineSource::Direct(SendPtr::from_const(image.origin_ptr::<T>()?)));
        }
        let reader: Box<dyn ReadLine<T>> = dispatch_sample_type!(dt, S => {
            Box::new(Converter::<S> { origin: SendPtr::from_const(image.origin_ptr::<S>()?) }) as Box<dyn ReadLine<T>>
        });
        Ok(LineSource::Staged(reader))
    }

    /// Always-staged source over samples of type `S` that the caller also
    /// writes through.
    pub(crate) fn aliased_from<S: Sample>(origin: SendPtr<S>) -> Self {
        LineSource::Staged(Box::new(Converter::<S> { origin }))
    }

    /// # Safety
    /// `geometry` must address valid samples of the source image.
    pub(crate) unsafe fn line<'b>(&self, geometry: LineGeometry, staging: &'b mut Vec<T>) -> InLine<'b, T> {
        match self {
            LineSource::Direct(origin) => InLine::from_raw(
                origin.as_const().offset(geometry.offset),
                geometry.length,
                geometry.stride,
                geometry.tensor_elements,
                geometry.tensor_stride,
            ),
            LineSource::Staged(reader) => {
                staging.resize(geometry.length * geometry.tensor_elements, T::default());
                reader.read(geometry, staging);
                InLine::from_slice(staging, geometry.tensor_elements)
            }
        }
    }

    /// Copy the line into `dest[..]` (length × tensor samples, pixel-major).
    ///
    /// # Safety
    /// As for [`LineSource::line`].
    pub(crate) unsafe fn read_into(&self, geometry: LineGeometry, dest: &mut [T]) {
        match self {
            LineSource::Direct(origin) => {
                let origin = origin.as_const();
                for i in 0..geometry.length {
                    for t in 0..geometry.tensor_elements {
                        dest[i * geometry.tensor_elements + t] = *origin.offset(geometry.index(i, t));
                    }
                }
            }
            LineSource::Staged(reader) => reader.read(geometry, dest),
        }
    }
}

/// Where a line filter's output samples go.
pub(crate) enum LineSink<T> {
    Direct(SendPtr<T>),
    Staged(Box<dyn WriteLine<T>>),
}

impl<T: Sample> LineSink<T> {
    /// Write into `image`, converting when its type differs from `T`.
    pub(crate) fn new(image: &mut Image) -> Result<Self> {
        let dt = image.data_type();
        if !T::DATA_TYPE.converts_to(dt) {
            return Err(FrameError::UnsupportedConversion {
                from: T::DATA_TYPE,
                to: dt,
            });
        }
        if dt == T::DATA_TYPE {
            return Ok(LineSink::Direct(SendPtr(image.origin_ptr_mut::<T>()?)));
        }
        let writer: Box<dyn WriteLine<T>> = dispatch_sample_type!(dt, S => {
            Box::new(Converter::<S> { origin: SendPtr(image.origin_ptr_mut::<S>()?) }) as Box<dyn WriteLine<T>>
        });
        Ok(LineSink::Staged(writer))
    }

    /// # Safety
    /// `geometry` must address valid samples of the output that no other
    /// thread touches.
    pub(crate) unsafe fn line<'b>(&self, geometry: LineGeometry, staging: &'b mut Vec<T>) -> OutLine<'b, T> {
        match self {
            LineSink::Direct(origin) => OutLine::from_raw(
                origin.as_ptr().offset(geometry.offset),
                geometry.length,
                geometry.stride,
                geometry.tensor_elements,
                geometry.tensor_stride,
            ),
            LineSink::Staged(_) => {
                staging.resize(geometry.length * geometry.tensor_elements, T::default());
                OutLine::from_slice(staging, geometry.tensor_elements)
            }
        }
    }

    /// Flush a staged line; no-op for direct sinks.
    ///
    /// # Safety
    /// As for [`LineSink::line`].
    pub(crate) unsafe fn commit(&self, geometry: LineGeometry, staging: &[T]) {
        if let LineSink::Staged(writer) = self {
            writer.write(geometry, staging);
        }
    }
}
