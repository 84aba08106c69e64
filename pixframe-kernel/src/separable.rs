//! Separable strategy: one 1-D line filter per dimension, applied in order.
//!
//! The input is copied once into a contiguous working image of the flex
//! type `T`. Each selected dimension is then processed in place: every line
//! is staged into a per-thread buffer with `border` boundary-extended samples
//! on each side, and the line filter writes the result back over the line.
//! Tensor elements are processed as independent channels.

use pixframe_view::{dispatch_flex_type, expand_array_parameter, DataType, Flex, FrameError, Image};

use crate::arithmetic::convert;
use crate::boundary::{already_expanded, copy_as, extend_line, resolve_boundary_conditions, BoundaryCondition};
use crate::filter1d::{OneDimensionalFilter, PreparedFilter};
use crate::line_buffer::OutLine;
use crate::lines::LinePlan;
use crate::threading::{partition, run_partitioned, thread_count, SendPtr};
use crate::Result;

/// One line as seen by a [`SeparableLineFilter`].
pub struct SeparableLineParams<'a, T> {
    /// The input line with `border` extended samples on each side. The
    /// filter may use it as scratch space.
    pub buffer: &'a mut [T],
    pub border: usize,
    /// Number of output pixels; `buffer.len() == length + 2 * border`.
    pub length: usize,
    pub output: OutLine<'a, T>,
    pub dimension: usize,
    /// Coordinates of the first pixel of the line in the working image.
    pub position: &'a [usize],
    pub thread: usize,
}

/// Per-line callback of the separable strategy.
pub trait SeparableLineFilter<T>: Sync {
    /// Called once per invocation, before any dimension is processed.
    fn set_number_of_threads(&mut self, _threads: usize) {}

    fn filter(&self, params: &mut SeparableLineParams<'_, T>) -> Result<()>;
}

/// Run `filter` along every dimension selected by `process`, computing in `T`.
///
/// `process`, `border` and `bc` have length 0, 1 or the dimensionality;
/// an empty `process` selects all dimensions. Dimensions of size ≤ 1 are
/// never processed. The result is written to `out` as `out_type` (or in
/// `out`'s own type when it is protected).
pub fn separable<T, F>(
    input: &Image,
    out: &mut Image,
    out_type: DataType,
    process: &[bool],
    border: &[usize],
    bc: &[BoundaryCondition],
    filter: &mut F,
) -> Result<()>
where
    T: Flex,
    F: SeparableLineFilter<T>,
{
    if !input.is_forged() {
        return Err(FrameError::NotForged);
    }
    let n = input.dimensionality();
    let mut process = expand_array_parameter("process", process, n, true)?;
    let mut border = expand_array_parameter("border", border, n, 0)?;
    let bc = resolve_boundary_conditions(bc, n)?;
    let expanded = already_expanded(&bc)?;
    for d in 0..n {
        if input.size(d) <= 1 {
            process[d] = false;
        }
        if !process[d] {
            border[d] = 0;
        } else if !expanded && border[d] > 0 {
            bc[d].validate::<T>()?;
        }
    }
    let stored = if out.is_protected() && out.is_forged() {
        out.data_type()
    } else {
        out_type
    };
    if !T::DATA_TYPE.converts_to(stored) {
        return Err(FrameError::UnsupportedConversion {
            from: T::DATA_TYPE,
            to: stored,
        });
    }
    if !process.contains(&true) {
        return convert(input, out, out_type);
    }

    let mut work = if expanded {
        let origin: Vec<isize> = border.iter().map(|&b| -(b as isize)).collect();
        let sizes: Vec<usize> = (0..n).map(|d| input.size(d) + 2 * border[d]).collect();
        copy_as::<T>(&input.window(&origin, &sizes)?, &[])?
    } else {
        copy_as::<T>(input, &[])?
    };

    let mut loop_sizes = work.sizes().to_vec();
    loop_sizes.push(work.tensor_elements());
    let mut loop_strides = work.strides().to_vec();
    loop_strides.push(work.tensor_stride());
    let samples = work.number_of_samples();
    let operations: usize = (0..n)
        .filter(|&d| process[d])
        .map(|d| samples.saturating_mul(2 * border[d] + 1))
        .sum();
    let max_lines = (0..n)
        .filter(|&d| process[d])
        .map(|d| samples / work.size(d))
        .max()
        .unwrap_or(1);
    let threads = thread_count(max_lines, operations, true);
    log::trace!("separable: {} dimension(s) on {} thread(s)", process.iter().filter(|&&p| p).count(), threads);
    filter.set_number_of_threads(threads);
    let filter: &F = filter;
    let origin = SendPtr(work.origin_ptr_mut::<T>()?);

    for d in (0..n).filter(|&d| process[d]) {
        let plan = LinePlan::new(&loop_sizes, d, &[&loop_strides]);
        let (length, b) = (input.size(d), border[d]);
        let stride = plan.line_stride(0);
        let rule = bc[d];
        let ranges = partition(plan.lines(), threads);
        log::trace!("separable: dimension {} has {} lines of {}", d, plan.lines(), plan.length());
        run_partitioned(&ranges, |thread, range| {
            let mut buffer = vec![T::zero(); length + 2 * b];
            plan.for_each_line(range, |position, offsets| {
                // SAFETY: `work` is exclusively owned; each line lies within
                // its extent and lines are disjoint between threads. The
                // line is fully staged before the filter writes to it.
                let output = unsafe {
                    let base = origin.as_ptr().offset(offsets[0]);
                    if expanded {
                        for (i, v) in buffer.iter_mut().enumerate() {
                            *v = *base.offset(i as isize * stride);
                        }
                        OutLine::from_raw(base.offset(b as isize * stride), length, stride, 1, 1)
                    } else {
                        for i in 0..length {
                            buffer[b + i] = *base.offset(i as isize * stride);
                        }
                        extend_line(&mut buffer, b, length, rule)?;
                        OutLine::from_raw(base, length, stride, 1, 1)
                    }
                };
                let mut params = SeparableLineParams {
                    buffer: &mut buffer,
                    border: b,
                    length,
                    output,
                    dimension: d,
                    position,
                    thread,
                };
                filter.filter(&mut params)
            })
        })?;
    }

    if expanded {
        let origin: Vec<isize> = border.iter().map(|&b| b as isize).collect();
        let result = work.window(&origin, input.sizes())?;
        convert(&result, out, out_type)
    } else if !out.is_protected() && out_type == T::DATA_TYPE {
        *out = work;
        Ok(())
    } else {
        convert(&work, out, out_type)
    }
}

// ============================================================================
// Separable convolution
// ============================================================================

struct ConvolutionLineFilter<T> {
    filters: Vec<Option<PreparedFilter<T>>>,
}

impl<T: Flex> SeparableLineFilter<T> for ConvolutionLineFilter<T> {
    fn filter(&self, params: &mut SeparableLineParams<'_, T>) -> Result<()> {
        match &self.filters[params.dimension] {
            Some(f) => f.apply(params.buffer, params.border, params.length, &mut params.output),
            None => {
                for i in 0..params.length {
                    params.output.set(i, params.buffer[params.border + i]);
                }
            }
        }
        Ok(())
    }
}

/// Convolve `input` with one 1-D filter per dimension (or one for all).
///
/// Identity filters skip their dimension. Computation happens in the flex
/// type of the input, or its complex counterpart when any filter is complex.
pub fn separable_convolution(
    input: &Image,
    out: &mut Image,
    filters: &[OneDimensionalFilter],
    bc: &[BoundaryCondition],
    process: &[bool],
) -> Result<()> {
    if !input.is_forged() {
        return Err(FrameError::NotForged);
    }
    let n = input.dimensionality();
    if filters.is_empty() {
        return Err(FrameError::ArrayParameterWrongLength {
            name: "filter",
            expected: n,
            found: 0,
        });
    }
    let filters = expand_array_parameter("filter", filters, n, OneDimensionalFilter::new(vec![]))?;
    let mut process = expand_array_parameter("process", process, n, true)?;
    let mut border = vec![0; n];
    for d in 0..n {
        process[d] &= !filters[d].is_identity();
        if process[d] {
            border[d] = filters[d].border()?;
        }
    }
    let complex = (0..n).any(|d| process[d] && filters[d].is_complex());
    let compute = if complex {
        input.data_type().suggest_complex()
    } else {
        input.data_type().suggest_flex()
    };
    log::debug!("separable convolution in {} over dimensions {:?}", compute, process);
    dispatch_flex_type!(compute, "separable convolution", T => {
        let prepared = filters
            .iter()
            .zip(&process)
            .map(|(f, &p)| if p { f.prepare::<T>() } else { Ok(None) })
            .collect::<Result<Vec<_>>>()?;
        let mut line_filter = ConvolutionLineFilter { filters: prepared };
        separable::<T, _>(input, out, compute, &process, &border, bc, &mut line_filter)
    })
}
