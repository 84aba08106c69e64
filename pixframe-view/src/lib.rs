//! Run-time typed, strided N-dimensional sample arrays.
//!
//! An [`Image`] describes a buffer of samples through sizes, strides (in
//! samples, not bytes), an offset, a per-pixel [`TensorShape`] and a
//! [`DataType`] tag. Transposed, cropped and singleton-expanded images are
//! all expressed through strides over a shared buffer, without copies.
//!
//! # Core Types
//!
//! - [`Image`]: the array model (raw → forged → reforged lifecycle, protection flag)
//! - [`ImageView`]: typed read-only view for element access
//! - [`SampleBuffer`]: owned storage, one variant per [`DataType`]
//! - [`Sample`] / [`Flex`]: storable types and types computations run in
//!
//! # Example
//!
//! ```rust
//! use pixframe_view::{DataType, Image};
//!
//! let img = Image::from_fn(&[3, 2], |c| (c[0] + 10 * c[1]) as f32);
//! assert_eq!(img.data_type(), DataType::F32);
//! assert_eq!(img.strides(), &[1, 3]);
//! assert_eq!(img.sample::<f64>(&[2, 1]).unwrap(), 12.0);
//!
//! // Singleton expansion is a zero stride, no data is duplicated.
//! let mut row = Image::from_fn(&[4, 1], |c| c[0] as u8);
//! row.expand_singleton_dimension(1, 5).unwrap();
//! assert_eq!(row.sizes(), &[4, 5]);
//! assert_eq!(row.strides(), &[1, 0]);
//! ```

pub mod buffer;
pub mod image;
pub mod sample;
pub mod tensor;
pub mod view;

pub use num_complex;

pub use buffer::SampleBuffer;
pub use image::{col_major_strides, CoordIter, Image};
pub use sample::{convert, DataType, Flex, Sample};
pub use tensor::TensorShape;
pub use view::ImageView;

// ============================================================================
// Error types
// ============================================================================

/// Errors raised by image and framework operations.
///
/// Every contract check runs before any worker is started, so receiving one
/// of these means nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("image is not forged")]
    NotForged,

    #[error("image is protected and cannot be reforged to {0}")]
    ProtectedImage(String),

    #[error("dimensionality mismatch: expected {expected}, got {found}")]
    DimensionalityMismatch { expected: usize, found: usize },

    #[error("sizes mismatch: {0:?} vs {1:?}")]
    SizesMismatch(Vec<usize>, Vec<usize>),

    #[error("tensor shape mismatch: {0} vs {1} elements")]
    TensorMismatch(usize, usize),

    #[error("array parameter `{name}` has length {found}, expected 1 or {expected}")]
    ArrayParameterWrongLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("kernel size {kernel} exceeds image size {image} along dimension {dim}")]
    KernelTooLarge {
        dim: usize,
        kernel: usize,
        image: usize,
    },

    #[error("invalid axis {axis} for dimensionality {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    #[error("coordinates or window fall outside the image data")]
    OutOfBounds,

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid flag: {0}")]
    InvalidFlag(String),

    #[error("cannot write to a singleton-expanded image")]
    SingletonExpandedWrite,

    #[error("image data is shared with another image and cannot be written")]
    SharedData,

    #[error("in-place execution was not allowed by the caller")]
    InPlaceNotAllowed,

    #[error("data type {data_type} not supported by {operation}")]
    UnsupportedDataType {
        data_type: DataType,
        operation: &'static str,
    },

    #[error("cannot convert {from} samples to {to}")]
    UnsupportedConversion { from: DataType, to: DataType },

    #[error("image holds {found} samples, {requested} requested")]
    DataTypeMismatch { found: DataType, requested: DataType },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Check that a per-dimension parameter array has length 1 or `n`, and
/// expand it to length `n`.
///
/// An empty array yields `n` copies of `default`.
pub fn expand_array_parameter<T: Clone>(
    name: &'static str,
    values: &[T],
    n: usize,
    default: T,
) -> Result<Vec<T>> {
    match values.len() {
        0 => Ok(vec![default; n]),
        1 => Ok(vec![values[0].clone(); n]),
        len if len == n => Ok(values.to_vec()),
        len => Err(FrameError::ArrayParameterWrongLength {
            name,
            expected: n,
            found: len,
        }),
    }
}
