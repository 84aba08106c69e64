use pixframe_kernel::{general_convolution, separable_convolution, BoundaryCondition, Kernel};
use pixframe_view::{FrameError, Image};

use crate::cost::CostModel;
use crate::error::{ConvolutionError, Result};
use crate::fourier::{convolve_ft, Representation};
use crate::method::ConvolutionMethod;
use crate::separate::separate_filter;

/// Settings of [`convolution_with`].
#[derive(Debug, Clone, Default)]
pub struct ConvolutionOptions {
    pub method: ConvolutionMethod,
    /// Length 0, 1 or the image dimensionality. Empty means the default
    /// condition (symmetric mirror) for every method.
    pub boundary: Vec<BoundaryCondition>,
    pub cost_model: CostModel,
}

/// Convolve `input` with the kernel image `kernel` (origin at `size / 2`).
///
/// See [`convolution_with`].
pub fn convolution(
    input: &Image,
    kernel: &Image,
    out: &mut Image,
    method: ConvolutionMethod,
    bc: &[BoundaryCondition],
) -> Result<()> {
    let options = ConvolutionOptions {
        method,
        boundary: bc.to_vec(),
        cost_model: CostModel::default(),
    };
    convolution_with(input, kernel, out, &options)
}

/// Convolve `input` with `kernel` using one of the separable, Fourier or
/// direct strategies.
///
/// With [`ConvolutionMethod::Best`] the cost model decides: the separable
/// route is tried when it beats the Fourier estimate, and is taken if the
/// kernel decomposes; otherwise the Fourier route is taken when it beats the
/// direct estimate, and the direct route when it does not. An explicit method is always
/// honored, and [`ConvolutionMethod::Separable`] on a kernel that does not
/// decompose fails with [`ConvolutionError::NotSeparable`].
pub fn convolution_with(input: &Image, kernel: &Image, out: &mut Image, options: &ConvolutionOptions) -> Result<()> {
    if !input.is_forged() || !kernel.is_forged() {
        return Err(FrameError::NotForged.into());
    }
    let n = input.dimensionality();
    let mut filter = kernel.quick_copy();
    if filter.dimensionality() < n {
        filter.expand_dimensionality(n);
    }
    if filter.dimensionality() > n {
        return Err(FrameError::DimensionalityMismatch {
            expected: n,
            found: filter.dimensionality(),
        }
        .into());
    }
    let bc = options.boundary.as_slice();

    let (try_separable, try_fourier) = match options.method {
        ConvolutionMethod::Direct => (false, false),
        ConvolutionMethod::Fourier => (false, true),
        ConvolutionMethod::Separable => (true, false),
        ConvolutionMethod::Best => {
            let model = &options.cost_model;
            let cost = model.estimate(input.sizes(), input.number_of_samples(), filter.sizes());
            log::debug!(
                "convolution cost estimates: Fourier {:.3e}, separable {:.3e}, direct {:.3e}",
                cost.fourier,
                cost.separable,
                cost.direct
            );
            (cost.try_separable(), cost.try_fourier())
        }
    };

    if try_separable {
        if let Some(filters) = separate_filter(&filter) {
            log::debug!("convolution: separable, {} filter(s)", filters.len());
            separable_convolution(input, out, &filters, bc, &[])?;
            return Ok(());
        }
        if options.method == ConvolutionMethod::Separable {
            return Err(ConvolutionError::NotSeparable);
        }
    }
    if try_fourier {
        log::debug!("convolution: Fourier");
        // Always pad, so the result follows the same boundary rule as the
        // other methods.
        let padded = if bc.is_empty() { vec![BoundaryCondition::default()] } else { bc.to_vec() };
        let spatial = Representation::Spatial;
        return convolve_ft(input, &filter, out, spatial, spatial, spatial, &padded);
    }
    log::debug!("convolution: direct");
    general_convolution(input, &Kernel::new(filter)?, out, bc)?;
    Ok(())
}
