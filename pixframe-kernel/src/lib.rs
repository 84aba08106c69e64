//! Line-based execution strategies over [`pixframe_view::Image`].
//!
//! Algorithms are written as small per-line callbacks; this crate does the
//! rest: broadcasting, processing-dimension choice, boundary extension, type
//! conversion through staging buffers and static multithreading.
//!
//! # Strategies
//!
//! - [`scan`]: pointwise over any number of broadcast inputs ([`ScanLineFilter`])
//! - [`separable`]: one dimension at a time, with boundary-extended lines ([`SeparableLineFilter`])
//! - [`full`]: neighborhood over an arbitrary [`Kernel`] through its [`PixelTable`] ([`FullLineFilter`])
//!
//! # Filters built on them
//!
//! - [`add`], [`subtract`], [`multiply_samplewise`], [`real_part`], [`convert`]
//! - [`separable_convolution`] with [`OneDimensionalFilter`] symmetry kinds
//! - [`general_convolution`], [`uniform`]
//!
//! # Example
//!
//! ```rust
//! use pixframe_kernel::{add, DataType};
//! use pixframe_view::Image;
//!
//! let column = Image::from_fn(&[256, 1], |c| c[0] as f32);
//! let one = Image::from_vec(&[], vec![1.0f32]).unwrap();
//! let mut out = Image::default();
//! add(&column, &one, &mut out, DataType::F32).unwrap();
//! assert_eq!(out.sizes(), &[256, 1]);
//! assert_eq!(out.sample::<f32>(&[255, 0]).unwrap(), 256.0);
//! ```

pub mod arithmetic;
pub mod boundary;
pub mod filter1d;
pub mod full;
pub mod line_buffer;
pub(crate) mod lines;
pub mod pixel_table;
pub mod scan;
pub mod separable;
pub mod threading;

pub use pixframe_view::{DataType, FrameError, Image, Result};

pub use arithmetic::{add, convert, multiply_samplewise, multiply_samplewise_in_place, real_part, subtract};
pub use boundary::{
    extend_image, extend_line, parse_boundary_conditions, resolve_boundary_conditions, BoundaryCondition,
};
pub use filter1d::{FilterSymmetry, FilterTaps, OneDimensionalFilter};
pub use full::{full, general_convolution, uniform, FullLineFilter, FullLineParams, Neighborhood};
pub use line_buffer::{InLine, OutLine};
pub use lines::optimal_processing_dim;
pub use pixel_table::{Kernel, PixelRun, PixelTable, PixelTableOffsets, PixelWeights};
pub use scan::{
    scan, scan_dyadic, scan_in_place, scan_monadic, DyadicLineFilter, MonadicLineFilter, ScanLineFilter,
    ScanLineParams, ScanOptions,
};
pub use separable::{separable, separable_convolution, SeparableLineFilter, SeparableLineParams};
pub use threading::max_threads;
