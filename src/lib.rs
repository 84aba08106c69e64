//! Convolution over run-time typed strided images.
//!
//! This crate is the top of the `pixframe` stack:
//!
//! - [`pixframe_view`]: the image model ([`Image`], [`DataType`], tensor shapes)
//! - [`pixframe_kernel`]: the scan, separable and full execution strategies and
//!   the direct filters built on them
//! - this crate: the convolution dispatcher, which picks one of those
//!   strategies (or a product of Fourier transforms) per call
//!
//! # Core Types
//!
//! - [`ConvolutionMethod`]: `"direct"`, `"separable"`, `"Fourier"` or `"best"`
//! - [`CostModel`]: the coefficient table behind `"best"`
//! - [`ConvolutionOptions`]: method, boundary conditions and cost model
//! - [`ConvolutionError`]: [`FrameError`] plus dispatcher failures
//!
//! # Operations
//!
//! - [`convolution`], [`convolution_with`]: the dispatcher
//! - [`separate_filter`]: rank-1 decomposition of a kernel image
//! - [`fourier_transform`]: N-D transform over the separable strategy
//! - [`convolve_ft`]: convolution as a product of transforms
//!
//! # Example
//!
//! ```rust
//! use pixframe::{convolution, BoundaryCondition, ConvolutionMethod, Image};
//!
//! let img = Image::from_fn(&[32, 24], |c| (c[0] + c[1]) as f32);
//! let kernel = Image::from_fn(&[3, 3], |c| [1.0f32, 2.0, 1.0][c[0]] * [1.0f32, 2.0, 1.0][c[1]] / 16.0);
//!
//! let mut out = Image::default();
//! convolution(&img, &kernel, &mut out, ConvolutionMethod::Best, &[BoundaryCondition::SymmetricMirror]).unwrap();
//! assert_eq!(out.sizes(), &[32, 24]);
//! // A normalized symmetric kernel leaves a linear ramp unchanged away from the edges.
//! assert!((out.sample::<f32>(&[10, 10]).unwrap() - 20.0).abs() < 1e-4);
//! ```

mod convolution;
mod cost;
mod error;
mod fourier;
mod method;
mod separate;

pub use pixframe_kernel;
pub use pixframe_view;

// ============================================================================
// Image model
// ============================================================================
pub use pixframe_view::{DataType, FrameError, Image, TensorShape};

// ============================================================================
// Strategies and direct filters
// ============================================================================
pub use pixframe_kernel::{
    general_convolution, separable_convolution, uniform, BoundaryCondition, FilterSymmetry, Kernel,
    OneDimensionalFilter,
};

// ============================================================================
// Dispatcher
// ============================================================================
pub use convolution::{convolution, convolution_with, ConvolutionOptions};
pub use cost::{CostEstimate, CostModel};
pub use error::{ConvolutionError, Result};
pub use fourier::{convolve_ft, fourier_transform, optimal_fourier_size, Representation, TransformOptions};
pub use method::ConvolutionMethod;
pub use separate::separate_filter;
