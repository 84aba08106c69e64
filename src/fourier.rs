//! N-D discrete Fourier transform over the separable framework, and
//! convolution as a product of transforms.
//!
//! The 1-D transforms come from `rustfft`; one plan is made per processed
//! dimension and shared by all threads. Frequency-domain images use the
//! standard DFT ordering (zero frequency at index 0). The forward transform
//! is unscaled and the inverse scales each axis by `1/n`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use num_complex::Complex;
use num_traits::FromPrimitive;
use rustfft::{Fft, FftNum, FftPlanner};

use pixframe_kernel::{
    convert, extend_image, multiply_samplewise, multiply_samplewise_in_place, real_part, separable,
    BoundaryCondition, SeparableLineFilter, SeparableLineParams,
};
use pixframe_view::{dispatch_flex_type, CoordIter, DataType, Flex, FrameError, Image, Sample};

use crate::error::{ConvolutionError, Result};

/// Smallest 5-smooth number (only factors 2, 3 and 5) that is at least `n`.
pub fn optimal_fourier_size(n: usize) -> usize {
    fn smooth(mut m: usize) -> bool {
        for p in [2, 3, 5] {
            while m % p == 0 {
                m /= p;
            }
        }
        m == 1
    }
    let mut m = n.max(1);
    while !smooth(m) {
        m += 1;
    }
    m
}

/// Direction and output kind of [`fourier_transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformOptions {
    pub inverse: bool,
    /// Keep only the real part of the result.
    pub real_output: bool,
}

impl TransformOptions {
    pub fn inverse() -> Self {
        Self {
            inverse: true,
            real_output: false,
        }
    }
}

/// Domain an image argument of [`convolve_ft`] lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Representation {
    #[default]
    Spatial,
    Frequency,
}

impl FromStr for Representation {
    type Err = ConvolutionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spatial" => Ok(Representation::Spatial),
            "frequency" => Ok(Representation::Frequency),
            other => Err(FrameError::InvalidFlag(format!("representation `{}`", other)).into()),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Representation::Spatial => "spatial",
            Representation::Frequency => "frequency",
        })
    }
}

// ============================================================================
// Transform
// ============================================================================

struct FftLineFilter<R: FftNum> {
    plans: Vec<Option<Arc<dyn Fft<R>>>>,
    /// Per-dimension factor applied to the output, `None` when 1.
    scales: Vec<Option<R>>,
}

impl<R> SeparableLineFilter<Complex<R>> for FftLineFilter<R>
where
    R: FftNum,
    Complex<R>: Flex<Real = R>,
{
    fn filter(&self, params: &mut SeparableLineParams<'_, Complex<R>>) -> pixframe_kernel::Result<()> {
        let d = params.dimension;
        let Some(plan) = &self.plans[d] else {
            return Ok(());
        };
        let line = &mut params.buffer[params.border..params.border + params.length];
        plan.process(line);
        match self.scales[d] {
            Some(s) => line.iter().enumerate().for_each(|(i, &v)| params.output.set(i, v.scale(s))),
            None => line.iter().enumerate().for_each(|(i, &v)| params.output.set(i, v)),
        }
        Ok(())
    }
}

fn transform<R>(input: &Image, out: &mut Image, options: TransformOptions) -> Result<()>
where
    R: FftNum,
    Complex<R>: Flex<Real = R>,
{
    let compute = <Complex<R> as Sample>::DATA_TYPE;
    let process: Vec<bool> = input.sizes().iter().map(|&s| s > 1).collect();
    let mut planner = FftPlanner::<R>::new();
    let plans = input
        .sizes()
        .iter()
        .zip(&process)
        .map(|(&len, &p)| match (p, options.inverse) {
            (false, _) => None,
            (true, false) => Some(planner.plan_fft_forward(len)),
            (true, true) => Some(planner.plan_fft_inverse(len)),
        })
        .collect();
    let scales = input
        .sizes()
        .iter()
        .zip(&process)
        .map(|(&len, &p)| {
            if p && options.inverse {
                <R as FromPrimitive>::from_f64(1.0 / len as f64)
            } else {
                None
            }
        })
        .collect();
    let mut filter = FftLineFilter { plans, scales };
    log::trace!("{} transform of {:?} in {}", if options.inverse { "inverse" } else { "forward" }, input.sizes(), compute);
    if options.real_output {
        let mut full = Image::default();
        separable::<Complex<R>, _>(input, &mut full, compute, &process, &[], &[], &mut filter)?;
        real_part(&full, out)?;
    } else {
        separable::<Complex<R>, _>(input, out, compute, &process, &[], &[], &mut filter)?;
    }
    Ok(())
}

/// Discrete Fourier transform along every dimension of size > 1.
///
/// Computes in the complex type matching the input precision (`C32` for
/// 8/16-bit integers, binary and `F32`/`C32`; `C64` otherwise). Tensor
/// elements are transformed independently.
pub fn fourier_transform(input: &Image, out: &mut Image, options: TransformOptions) -> Result<()> {
    if !input.is_forged() {
        return Err(FrameError::NotForged.into());
    }
    match input.data_type().suggest_complex() {
        DataType::C32 => transform::<f32>(input, out, options),
        DataType::C64 => transform::<f64>(input, out, options),
        other => Err(FrameError::UnsupportedDataType {
            data_type: other,
            operation: "Fourier transform",
        }
        .into()),
    }
}

// ============================================================================
// Convolution through the transform
// ============================================================================

/// Zero-pad `filter` to `sizes` with its origin (`size / 2`) moved to index 0.
fn circular_placement(filter: &Image, sizes: &[usize]) -> Result<Image> {
    let data_type = filter.data_type().suggest_flex();
    let mut placed = Image::new(sizes, filter.tensor(), data_type);
    let te = filter.tensor_elements();
    dispatch_flex_type!(data_type, "filter placement", T => {
        for coords in CoordIter::new(filter.sizes()) {
            let target: Vec<usize> = coords
                .iter()
                .enumerate()
                .map(|(d, &c)| (c as isize - (filter.size(d) / 2) as isize).rem_euclid(sizes[d] as isize) as usize)
                .collect();
            for t in 0..te {
                placed.set_tensor_sample(&target, t, filter.tensor_sample::<T>(&coords, t)?)?;
            }
        }
        Ok::<(), FrameError>(())
    })?;
    Ok(placed)
}

/// Convolve `input` with `filter` by multiplying their transforms.
///
/// Either argument may already be in the frequency domain, and the result
/// can be left there. A spatial filter has its origin at `size / 2` and may
/// not be larger than the input; a frequency-domain filter must match the
/// transform sizes.
///
/// Without boundary conditions the convolution is circular. With a
/// non-empty `bc` and everything spatial, each axis of the input is first
/// extended to `optimal_fourier_size(n + k - 1)` samples (image centered,
/// borders filled by `bc`) and the result is cropped back.
pub fn convolve_ft(
    input: &Image,
    filter: &Image,
    out: &mut Image,
    input_repr: Representation,
    filter_repr: Representation,
    out_repr: Representation,
    bc: &[BoundaryCondition],
) -> Result<()> {
    if !input.is_forged() || !filter.is_forged() {
        return Err(FrameError::NotForged.into());
    }
    let n = input.dimensionality();
    let mut filter = filter.quick_copy();
    if filter.dimensionality() < n {
        filter.expand_dimensionality(n);
    }
    if filter.dimensionality() != n || (0..n).any(|d| filter.size(d) > input.size(d)) {
        return Err(FrameError::SizesMismatch(filter.sizes().to_vec(), input.sizes().to_vec()).into());
    }
    let in_spatial = input_repr == Representation::Spatial;
    let filter_spatial = filter_repr == Representation::Spatial;
    let out_spatial = out_repr == Representation::Spatial;
    let padding = in_spatial && filter_spatial && out_spatial && !bc.is_empty();
    let mut real = true;
    let mut left = vec![0usize; n];

    let (mut in_ft, in_owned) = if in_spatial {
        real &= !input.data_type().is_complex();
        let mut ft = Image::default();
        if padding {
            let mut right = vec![0usize; n];
            for d in 0..n {
                let size = optimal_fourier_size(input.size(d) + filter.size(d) - 1);
                left[d] = (size - input.size(d)) / 2;
                right[d] = size - input.size(d) - left[d];
            }
            let extended = dispatch_flex_type!(input.data_type().suggest_flex(), "Fourier padding", T => {
                extend_image::<T>(input, &left, &right, bc)
            })?;
            fourier_transform(&extended, &mut ft, TransformOptions::default())?;
        } else {
            fourier_transform(input, &mut ft, TransformOptions::default())?;
        }
        (ft, true)
    } else {
        real = false;
        (input.quick_copy(), false)
    };

    let (mut filter_ft, filter_owned) = if filter_spatial {
        real &= !filter.data_type().is_complex();
        let placed = circular_placement(&filter, in_ft.sizes())?;
        let mut ft = Image::default();
        fourier_transform(&placed, &mut ft, TransformOptions::default())?;
        (ft, true)
    } else {
        real = false;
        if filter.sizes() != in_ft.sizes() {
            return Err(FrameError::SizesMismatch(filter.sizes().to_vec(), in_ft.sizes().to_vec()).into());
        }
        (filter, false)
    };

    let compute = in_ft.data_type().suggest_arithmetic(filter_ft.data_type());
    let product = if in_owned && in_ft.data_type() == compute {
        multiply_samplewise_in_place(&mut in_ft, &filter_ft)?;
        in_ft
    } else if filter_owned && filter_ft.data_type() == compute {
        multiply_samplewise_in_place(&mut filter_ft, &in_ft)?;
        filter_ft
    } else {
        let mut product = Image::default();
        multiply_samplewise(&in_ft, &filter_ft, &mut product, compute)?;
        product
    };
    log::trace!("convolve_ft: product of {:?} in {}, padded: {}", product.sizes(), compute, padding);

    if !out_spatial {
        if out.is_protected() {
            convert(&product, out, compute)?;
        } else {
            *out = product;
        }
        return Ok(());
    }
    let options = TransformOptions {
        inverse: true,
        real_output: real,
    };
    if padding {
        let mut full = Image::default();
        fourier_transform(&product, &mut full, options)?;
        let origin: Vec<isize> = left.iter().map(|&l| l as isize).collect();
        let cropped = full.window(&origin, input.sizes())?;
        convert(&cropped, out, cropped.data_type())?;
    } else {
        fourier_transform(&product, out, options)?;
    }
    Ok(())
}
