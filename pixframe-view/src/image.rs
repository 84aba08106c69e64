//! The image (array) model.
//!
//! An image is created raw (sizes and type only), forged when a buffer is
//! attached, and reforged when an operation needs a different size or type.
//! Buffers are reference counted: [`Image::quick_copy`] and
//! [`Image::window`] share the buffer read-only, and writing through any
//! image whose buffer is shared fails with [`FrameError::SharedData`].

use std::fmt;
use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::sample::{convert, DataType, Sample};
use crate::tensor::TensorShape;
use crate::view::ImageView;
use crate::{FrameError, Result};

/// Validate that every sample addressed by `sizes`/`strides` from `offset`
/// lies inside a buffer of length `len`.
fn validate_bounds(len: usize, sizes: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if sizes.len() != strides.len() {
        return Err(FrameError::DimensionalityMismatch {
            expected: sizes.len(),
            found: strides.len(),
        });
    }
    if sizes.iter().any(|&s| s == 0) {
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&size, &stride) in sizes.iter().zip(strides.iter()) {
        if size > 1 {
            let end = stride
                .checked_mul(size as isize - 1)
                .ok_or(FrameError::OutOfBounds)?;
            if end >= 0 {
                max_offset = max_offset.checked_add(end).ok_or(FrameError::OutOfBounds)?;
            } else {
                min_offset = min_offset.checked_add(end).ok_or(FrameError::OutOfBounds)?;
            }
        }
    }
    if min_offset < 0 || max_offset < 0 || max_offset as usize >= len {
        return Err(FrameError::OutOfBounds);
    }
    Ok(())
}

/// Column-major strides with `tensor_elements` interleaved samples per pixel.
pub fn col_major_strides(sizes: &[usize], tensor_elements: usize) -> Vec<isize> {
    let mut strides = Vec::with_capacity(sizes.len());
    let mut step = tensor_elements.max(1) as isize;
    for &size in sizes {
        strides.push(step);
        step *= size.max(1) as isize;
    }
    strides
}

/// Iterates over all coordinates of a box, first dimension fastest.
#[derive(Debug, Clone)]
pub struct CoordIter {
    sizes: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl CoordIter {
    pub fn new(sizes: &[usize]) -> Self {
        let next = if sizes.iter().any(|&s| s == 0) {
            None
        } else {
            Some(vec![0; sizes.len()])
        };
        Self {
            sizes: sizes.to_vec(),
            next,
        }
    }
}

impl Iterator for CoordIter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut following = current.clone();
        let mut advanced = false;
        for (c, &size) in following.iter_mut().zip(self.sizes.iter()) {
            *c += 1;
            if *c < size {
                advanced = true;
                break;
            }
            *c = 0;
        }
        if advanced {
            self.next = Some(following);
        }
        Some(current)
    }
}

// ============================================================================
// Image
// ============================================================================

/// N-dimensional strided image with tensor-valued pixels and a run-time
/// sample type.
pub struct Image {
    data: Option<Arc<SampleBuffer>>,
    data_type: DataType,
    sizes: Vec<usize>,
    strides: Vec<isize>,
    tensor: TensorShape,
    tensor_stride: isize,
    offset: isize,
    protected: bool,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("forged", &self.is_forged())
            .field("data_type", &self.data_type)
            .field("sizes", &self.sizes)
            .field("strides", &self.strides)
            .field("tensor", &self.tensor)
            .field("tensor_stride", &self.tensor_stride)
            .field("offset", &self.offset)
            .field("protected", &self.protected)
            .finish()
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::raw(&[], TensorShape::Scalar, DataType::F32)
    }
}

impl Image {
    /// Raw (unforged) image with the given properties.
    pub fn raw(sizes: &[usize], tensor: TensorShape, data_type: DataType) -> Self {
        Self {
            data: None,
            data_type,
            sizes: sizes.to_vec(),
            strides: col_major_strides(sizes, tensor.elements()),
            tensor,
            tensor_stride: 1,
            offset: 0,
            protected: false,
        }
    }

    /// Forged, zero-initialized image.
    pub fn new(sizes: &[usize], tensor: TensorShape, data_type: DataType) -> Self {
        let mut img = Self::raw(sizes, tensor, data_type);
        img.allocate();
        img
    }

    /// Forged scalar image of `data_type`.
    pub fn scalar_image(sizes: &[usize], data_type: DataType) -> Self {
        Self::new(sizes, TensorShape::Scalar, data_type)
    }

    /// Scalar image taking ownership of column-major `data`.
    pub fn from_vec<T: Sample>(sizes: &[usize], data: Vec<T>) -> Result<Self> {
        Self::from_vec_tensor(sizes, TensorShape::Scalar, data)
    }

    /// Image taking ownership of `data`, laid out column-major with the
    /// tensor elements of each pixel adjacent.
    pub fn from_vec_tensor<T: Sample>(
        sizes: &[usize],
        tensor: TensorShape,
        data: Vec<T>,
    ) -> Result<Self> {
        let expected = sizes.iter().product::<usize>() * tensor.elements();
        if data.len() != expected {
            return Err(FrameError::SizesMismatch(vec![expected], vec![data.len()]));
        }
        let mut img = Self::raw(sizes, tensor, T::DATA_TYPE);
        img.data = Some(Arc::new(T::into_buffer(data)));
        Ok(img)
    }

    /// Scalar image with each sample computed from its coordinates.
    pub fn from_fn<T: Sample>(sizes: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let data: Vec<T> = CoordIter::new(sizes).map(|c| f(&c)).collect();
        let mut img = Self::raw(sizes, TensorShape::Scalar, T::DATA_TYPE);
        img.data = Some(Arc::new(T::into_buffer(data)));
        img
    }

    fn allocate(&mut self) {
        let len = self.number_of_samples();
        self.strides = col_major_strides(&self.sizes, self.tensor.elements());
        self.tensor_stride = 1;
        self.offset = 0;
        self.data = Some(Arc::new(SampleBuffer::zeros(self.data_type, len)));
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn is_forged(&self) -> bool {
        self.data.is_some()
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn size(&self, dim: usize) -> usize {
        self.sizes[dim]
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn dimensionality(&self) -> usize {
        self.sizes.len()
    }

    pub fn number_of_pixels(&self) -> usize {
        self.sizes.iter().product()
    }

    pub fn number_of_samples(&self) -> usize {
        self.number_of_pixels() * self.tensor.elements()
    }

    pub fn tensor(&self) -> TensorShape {
        self.tensor
    }

    pub fn tensor_elements(&self) -> usize {
        self.tensor.elements()
    }

    pub fn tensor_stride(&self) -> isize {
        self.tensor_stride
    }

    pub fn is_scalar(&self) -> bool {
        self.tensor.is_scalar()
    }

    /// Offset of the first sample from the start of the buffer.
    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Set the protection flag, returning the previous value.
    ///
    /// A protected image keeps its sizes, tensor and sample type when used
    /// as an output; results are converted into it.
    pub fn protect(&mut self, protect: bool) -> bool {
        std::mem::replace(&mut self.protected, protect)
    }

    /// Whether any dimension of size > 1 has stride 0.
    pub fn is_singleton_expanded(&self) -> bool {
        self.sizes
            .iter()
            .zip(self.strides.iter())
            .any(|(&s, &st)| s > 1 && st == 0)
            || (self.tensor.elements() > 1 && self.tensor_stride == 0)
    }

    /// Forged, not singleton-expanded, and sole owner of its buffer.
    pub fn is_writable(&self) -> bool {
        match &self.data {
            Some(arc) => Arc::strong_count(arc) == 1 && !self.is_singleton_expanded(),
            None => false,
        }
    }

    pub fn shares_data_with(&self, other: &Image) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn buffer(&self) -> Option<&SampleBuffer> {
        self.data.as_deref()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Attach a zero-initialized buffer if the image is raw.
    pub fn forge(&mut self) {
        if self.data.is_none() {
            self.allocate();
        }
    }

    /// Detach the buffer.
    pub fn strip(&mut self) -> Result<()> {
        if self.protected {
            return Err(FrameError::ProtectedImage("a raw image".into()));
        }
        self.data = None;
        Ok(())
    }

    /// Make the image a writable buffer with the given properties, keeping
    /// the current buffer when it already fits.
    ///
    /// A protected image keeps its sample type (callers convert into it) and
    /// rejects any size or tensor change.
    pub fn reforge(&mut self, sizes: &[usize], tensor: TensorShape, data_type: DataType) -> Result<()> {
        let fits = self.is_forged()
            && self.sizes == sizes
            && self.tensor.elements() == tensor.elements()
            && (self.data_type == data_type || self.protected);
        if fits {
            if self.is_writable() {
                self.tensor = tensor;
                return Ok(());
            }
            if self.protected {
                return Err(if self.is_singleton_expanded() {
                    FrameError::SingletonExpandedWrite
                } else {
                    FrameError::SharedData
                });
            }
        } else if self.protected {
            return Err(FrameError::ProtectedImage(format!(
                "sizes {:?} with {} tensor elements",
                sizes,
                tensor.elements()
            )));
        }
        self.data_type = data_type;
        self.sizes = sizes.to_vec();
        self.tensor = tensor;
        self.allocate();
        Ok(())
    }

    /// Replace the tensor shape by one with the same number of elements.
    pub fn set_tensor_shape(&mut self, tensor: TensorShape) -> Result<()> {
        if tensor.elements() != self.tensor.elements() {
            return Err(FrameError::TensorMismatch(self.tensor.elements(), tensor.elements()));
        }
        self.tensor = tensor;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Zero-copy reshaping
    // ------------------------------------------------------------------

    /// Append singleton dimensions until the image has `n` dimensions.
    pub fn expand_dimensionality(&mut self, n: usize) {
        while self.sizes.len() < n {
            let stride = match (self.sizes.last(), self.strides.last()) {
                (Some(&s), Some(&st)) => st * s.max(1) as isize,
                _ => self.tensor.elements() as isize,
            };
            self.sizes.push(1);
            self.strides.push(stride);
        }
    }

    /// Virtually repeat a singleton dimension `size` times (stride 0).
    pub fn expand_singleton_dimension(&mut self, dim: usize, size: usize) -> Result<()> {
        if dim >= self.sizes.len() {
            return Err(FrameError::InvalidAxis {
                axis: dim,
                rank: self.sizes.len(),
            });
        }
        if self.sizes[dim] != 1 {
            let mut target = self.sizes.clone();
            target[dim] = size;
            return Err(FrameError::SizesMismatch(self.sizes.clone(), target));
        }
        self.sizes[dim] = size;
        self.strides[dim] = 0;
        Ok(())
    }

    /// Broadcast to `sizes`: append dimensions, then expand singletons.
    pub fn expand_singletons_to(&mut self, sizes: &[usize]) -> Result<()> {
        if self.sizes.len() > sizes.len() {
            return Err(FrameError::DimensionalityMismatch {
                expected: sizes.len(),
                found: self.sizes.len(),
            });
        }
        self.expand_dimensionality(sizes.len());
        for (dim, &size) in sizes.iter().enumerate() {
            if self.sizes[dim] != size {
                self.expand_singleton_dimension(dim, size)?;
            }
        }
        Ok(())
    }

    /// Reinterpret the tensor as an extra (last) spatial dimension.
    pub fn tensor_to_spatial(&mut self) {
        self.sizes.push(self.tensor.elements());
        self.strides.push(self.tensor_stride);
        self.tensor = TensorShape::Scalar;
        self.tensor_stride = 1;
    }

    /// Share the buffer through a window of `sizes` starting at `origin`.
    ///
    /// `origin` may be negative or the window larger than the image, as long
    /// as every addressed sample exists in the buffer.
    pub fn window(&self, origin: &[isize], sizes: &[usize]) -> Result<Image> {
        let data = self.data.as_ref().ok_or(FrameError::NotForged)?;
        let rank = self.sizes.len();
        if origin.len() != rank || sizes.len() != rank {
            return Err(FrameError::DimensionalityMismatch {
                expected: rank,
                found: origin.len().max(sizes.len()),
            });
        }
        let mut offset = self.offset;
        for (&o, &st) in origin.iter().zip(self.strides.iter()) {
            offset = offset
                .checked_add(o.checked_mul(st).ok_or(FrameError::OutOfBounds)?)
                .ok_or(FrameError::OutOfBounds)?;
        }
        let mut all_sizes = sizes.to_vec();
        all_sizes.push(self.tensor.elements());
        let mut all_strides = self.strides.clone();
        all_strides.push(self.tensor_stride);
        validate_bounds(data.len(), &all_sizes, &all_strides, offset)?;
        Ok(Image {
            data: Some(Arc::clone(data)),
            data_type: self.data_type,
            sizes: sizes.to_vec(),
            strides: self.strides.clone(),
            tensor: self.tensor,
            tensor_stride: self.tensor_stride,
            offset,
            protected: false,
        })
    }

    /// A second, unprotected image sharing this image's buffer.
    pub fn quick_copy(&self) -> Image {
        Image {
            data: self.data.clone(),
            data_type: self.data_type,
            sizes: self.sizes.clone(),
            strides: self.strides.clone(),
            tensor: self.tensor,
            tensor_stride: self.tensor_stride,
            offset: self.offset,
            protected: false,
        }
    }

    /// Deep copy into a new contiguous buffer of the same type.
    pub fn copy(&self) -> Result<Image> {
        crate::dispatch_sample_type!(self.data_type, T => {
            let view = self.view::<T>()?;
            let tensor = self.tensor.elements();
            let mut data = Vec::with_capacity(self.number_of_samples());
            for coords in CoordIter::new(&self.sizes) {
                for t in 0..tensor {
                    data.push(view.get_tensor(&coords, t));
                }
            }
            Image::from_vec_tensor(&self.sizes, self.tensor, data)
        })
    }

    // ------------------------------------------------------------------
    // Sample access
    // ------------------------------------------------------------------

    /// Typed read-only view; `T` must be the stored type.
    pub fn view<T: Sample>(&self) -> Result<ImageView<'_, T>> {
        let data = self.data.as_ref().ok_or(FrameError::NotForged)?;
        let slice = data.as_slice::<T>().ok_or(FrameError::DataTypeMismatch {
            found: self.data_type,
            requested: T::DATA_TYPE,
        })?;
        // Bounds hold by construction; views re-check in debug builds.
        Ok(ImageView::new(
            slice,
            &self.sizes,
            &self.strides,
            self.tensor.elements(),
            self.tensor_stride,
            self.offset,
        ))
    }

    fn linear_index(&self, coords: &[usize], t: usize) -> Result<isize> {
        if coords.len() != self.sizes.len() {
            return Err(FrameError::DimensionalityMismatch {
                expected: self.sizes.len(),
                found: coords.len(),
            });
        }
        if t >= self.tensor.elements() || coords.iter().zip(&self.sizes).any(|(&c, &s)| c >= s) {
            return Err(FrameError::OutOfBounds);
        }
        let mut idx = self.offset + t as isize * self.tensor_stride;
        for (&c, &st) in coords.iter().zip(self.strides.iter()) {
            idx += c as isize * st;
        }
        Ok(idx)
    }

    /// First tensor element at `coords`, converted to `T`.
    pub fn sample<T: Sample>(&self, coords: &[usize]) -> Result<T> {
        self.tensor_sample(coords, 0)
    }

    /// Tensor element `t` at `coords`, converted to `T`.
    pub fn tensor_sample<T: Sample>(&self, coords: &[usize], t: usize) -> Result<T> {
        if !self.data_type.converts_to(T::DATA_TYPE) {
            return Err(FrameError::UnsupportedConversion {
                from: self.data_type,
                to: T::DATA_TYPE,
            });
        }
        let idx = self.linear_index(coords, t)?;
        let data = self.data.as_ref().ok_or(FrameError::NotForged)?;
        Ok(crate::dispatch_sample_type!(self.data_type, S => {
            let slice = data.as_slice::<S>().ok_or(FrameError::NotForged)?;
            convert::<S, T>(slice[idx as usize])
        }))
    }

    fn exclusive_buffer(&mut self) -> Result<&mut SampleBuffer> {
        if self.is_singleton_expanded() {
            return Err(FrameError::SingletonExpandedWrite);
        }
        let data = self.data.as_mut().ok_or(FrameError::NotForged)?;
        Arc::get_mut(data).ok_or(FrameError::SharedData)
    }

    /// Write tensor element `t` at `coords`, converting from `T`.
    pub fn set_tensor_sample<T: Sample>(&mut self, coords: &[usize], t: usize, value: T) -> Result<()> {
        if !T::DATA_TYPE.converts_to(self.data_type) {
            return Err(FrameError::UnsupportedConversion {
                from: T::DATA_TYPE,
                to: self.data_type,
            });
        }
        let idx = self.linear_index(coords, t)? as usize;
        let data_type = self.data_type;
        let buffer = self.exclusive_buffer()?;
        crate::dispatch_sample_type!(data_type, S => {
            let slice = buffer.as_mut_slice::<S>().ok_or(FrameError::NotForged)?;
            slice[idx] = convert::<T, S>(value);
        });
        Ok(())
    }

    pub fn set_sample<T: Sample>(&mut self, coords: &[usize], value: T) -> Result<()> {
        self.set_tensor_sample(coords, 0, value)
    }

    /// Set every sample of the image (all tensor elements) to `value`.
    pub fn fill<T: Sample>(&mut self, value: T) -> Result<()> {
        if !T::DATA_TYPE.converts_to(self.data_type) {
            return Err(FrameError::UnsupportedConversion {
                from: T::DATA_TYPE,
                to: self.data_type,
            });
        }
        let sizes = self.sizes.clone();
        let strides = self.strides.clone();
        let (offset, tensor, tensor_stride) =
            (self.offset, self.tensor.elements(), self.tensor_stride);
        let data_type = self.data_type;
        let buffer = self.exclusive_buffer()?;
        crate::dispatch_sample_type!(data_type, S => {
            let slice = buffer.as_mut_slice::<S>().ok_or(FrameError::NotForged)?;
            let v = convert::<T, S>(value);
            for coords in CoordIter::new(&sizes) {
                let base = offset
                    + coords.iter().zip(strides.iter()).map(|(&c, &st)| c as isize * st).sum::<isize>();
                for t in 0..tensor {
                    slice[(base + t as isize * tensor_stride) as usize] = v;
                }
            }
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw access for line-based strategies
    // ------------------------------------------------------------------

    /// Pointer to the first sample (the image offset applied).
    ///
    /// Every sample addressed through the image's sizes and strides from
    /// this pointer lies inside the buffer.
    pub fn origin_ptr<T: Sample>(&self) -> Result<*const T> {
        let data = self.data.as_ref().ok_or(FrameError::NotForged)?;
        let slice = data.as_slice::<T>().ok_or(FrameError::DataTypeMismatch {
            found: self.data_type,
            requested: T::DATA_TYPE,
        })?;
        Ok(slice.as_ptr().wrapping_offset(self.offset))
    }

    /// Mutable pointer to the first sample. Fails when the buffer is shared
    /// or the image is singleton-expanded.
    pub fn origin_ptr_mut<T: Sample>(&mut self) -> Result<*mut T> {
        let (found, offset) = (self.data_type, self.offset);
        let buffer = self.exclusive_buffer()?;
        let slice = buffer.as_mut_slice::<T>().ok_or(FrameError::DataTypeMismatch {
            found,
            requested: T::DATA_TYPE,
        })?;
        Ok(slice.as_mut_ptr().wrapping_offset(offset))
    }
}
