//! Pointwise ("scan") strategy.
//!
//! Inputs are broadcast against each other (singleton dimensions become
//! stride 0), the common box is cut into scan lines along one processing
//! dimension, and the lines are statically partitioned over worker threads.
//! Every line is handed to a [`ScanLineFilter`] together with one [`InLine`]
//! per input and an [`OutLine`]; type conversion happens in per-thread
//! staging buffers when an image's sample type differs from the filter's.

use smallvec::SmallVec;

use pixframe_view::{dispatch_sample_type, DataType, FrameError, Image, Sample, TensorShape};

use crate::line_buffer::{InLine, LineGeometry, LineSink, LineSource, OutLine};
use crate::lines::{optimal_processing_dim, LinePlan};
use crate::threading::{partition, run_partitioned, thread_count, SendPtr};
use crate::Result;

/// Behaviour switches for [`scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Allow the output to alias the first input ([`scan_in_place`]).
    pub may_execute_in_place: bool,
    /// Treat the tensor elements as one more spatial dimension, so images
    /// with different tensor shapes can be combined.
    pub tensor_as_spatial_dim: bool,
    /// Always produce a full-size output, even if every input is singleton
    /// along some dimension.
    pub no_singleton_expansion: bool,
    pub no_multithreading: bool,
}

impl ScanOptions {
    pub fn in_place() -> Self {
        Self {
            may_execute_in_place: true,
            ..Self::default()
        }
    }

    pub fn tensor_as_spatial() -> Self {
        Self {
            tensor_as_spatial_dim: true,
            ..Self::default()
        }
    }
}

/// One scan line as seen by a [`ScanLineFilter`].
pub struct ScanLineParams<'a, TIn, TOut> {
    pub inputs: SmallVec<[InLine<'a, TIn>; 4]>,
    pub output: OutLine<'a, TOut>,
    /// Number of pixels in the line.
    pub length: usize,
    /// Dimension the line runs along.
    pub dimension: usize,
    /// Coordinates of the first pixel of the line.
    pub position: &'a [usize],
    pub thread: usize,
}

/// Per-line callback of the scan strategy.
pub trait ScanLineFilter<TIn, TOut>: Sync {
    /// Called once per invocation, before any line is processed.
    fn set_number_of_threads(&mut self, _threads: usize) {}

    /// Rough cost per output sample, used to decide on multithreading.
    fn operations_per_sample(&self) -> usize {
        1
    }

    fn filter(&self, params: &mut ScanLineParams<'_, TIn, TOut>) -> Result<()>;
}

// ============================================================================
// Geometry preparation
// ============================================================================

/// Layout of one participating array over the common box.
#[derive(Debug, Clone)]
struct Operand {
    strides: Vec<isize>,
    tensor_elements: usize,
    tensor_stride: isize,
}

/// Broadcast `images` to a common box of at least `min_rank` dimensions.
fn broadcast_operands(
    images: &[&Image],
    target: Option<&[usize]>,
    tensor_as_spatial: bool,
) -> Result<(Vec<usize>, Vec<Operand>)> {
    let rank = target.map_or(0, |t| t.len()).max(
        images.iter().map(|i| i.dimensionality()).max().unwrap_or(0),
    );
    let mut sizes: Vec<usize> = match target {
        Some(t) => {
            let mut s = t.to_vec();
            s.resize(rank, 1);
            s
        }
        None => vec![1; rank],
    };
    if target.is_none() {
        for img in images {
            for (d, &s) in img.sizes().iter().enumerate() {
                if sizes[d] == 1 {
                    sizes[d] = s;
                }
            }
        }
    }
    let mut operands = Vec::with_capacity(images.len());
    for img in images {
        let mut strides = Vec::with_capacity(rank);
        for d in 0..rank {
            let (s, st) = if d < img.dimensionality() {
                (img.size(d), img.strides()[d])
            } else {
                (1, 0)
            };
            if s == sizes[d] {
                strides.push(if s == 1 { 0 } else { st });
            } else if s == 1 {
                strides.push(0);
            } else {
                return Err(FrameError::SizesMismatch(img.sizes().to_vec(), sizes.clone()));
            }
        }
        operands.push(Operand {
            strides,
            tensor_elements: img.tensor_elements(),
            tensor_stride: img.tensor_stride(),
        });
    }
    if tensor_as_spatial {
        let te = operands.iter().map(|o| o.tensor_elements).max().unwrap_or(1);
        for op in operands.iter_mut() {
            if op.tensor_elements == te {
                op.strides.push(if te == 1 { 0 } else { op.tensor_stride });
            } else if op.tensor_elements == 1 {
                op.strides.push(0);
            } else {
                return Err(FrameError::TensorMismatch(op.tensor_elements, te));
            }
            op.tensor_elements = 1;
            op.tensor_stride = 1;
        }
        sizes.push(te);
    } else if let Some(first) = operands.first() {
        let te = first.tensor_elements;
        if let Some(bad) = operands.iter().find(|o| o.tensor_elements != te) {
            return Err(FrameError::TensorMismatch(te, bad.tensor_elements));
        }
    }
    Ok((sizes, operands))
}

fn output_operand(out: &Image, tensor_as_spatial: bool) -> Operand {
    let mut strides = out.strides().to_vec();
    if tensor_as_spatial {
        strides.push(out.tensor_stride());
        Operand {
            strides,
            tensor_elements: 1,
            tensor_stride: 1,
        }
    } else {
        Operand {
            strides,
            tensor_elements: out.tensor_elements(),
            tensor_stride: out.tensor_stride(),
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

fn run_lines<TIn, TOut, F>(
    sizes: &[usize],
    sources: &[LineSource<TIn>],
    operands: &[Operand],
    sink: &LineSink<TOut>,
    output: &Operand,
    filter: &mut F,
    options: ScanOptions,
) -> Result<()>
where
    TIn: Sample,
    TOut: Sample,
    F: ScanLineFilter<TIn, TOut>,
{
    if sizes.iter().any(|&s| s == 0) {
        return Ok(());
    }
    // 0-D images are a single one-pixel line.
    let (sizes, pad) = if sizes.is_empty() {
        (vec![1], true)
    } else {
        (sizes.to_vec(), false)
    };
    let stride_of = |op: &Operand| -> Vec<isize> {
        if pad {
            vec![0]
        } else {
            op.strides.clone()
        }
    };
    let out_strides = stride_of(output);
    let dim = optimal_processing_dim(&sizes, &out_strides);
    let mut all_strides: Vec<Vec<isize>> = operands.iter().map(stride_of).collect();
    all_strides.push(out_strides);
    let stride_refs: Vec<&[isize]> = all_strides.iter().map(|s| s.as_slice()).collect();
    let plan = LinePlan::new(&sizes, dim, &stride_refs);
    let n_in = sources.len();

    let total = sizes.iter().product::<usize>() * output.tensor_elements;
    let threads = thread_count(
        plan.lines(),
        total.saturating_mul(filter.operations_per_sample()),
        !options.no_multithreading,
    );
    log::trace!(
        "scan: {} lines of {} along dimension {} on {} thread(s)",
        plan.lines(),
        plan.length(),
        dim,
        threads
    );
    filter.set_number_of_threads(threads);
    let filter: &F = filter;
    let ranges = partition(plan.lines(), threads);

    run_partitioned(&ranges, |thread, range| {
        let mut in_staging: Vec<Vec<TIn>> = vec![Vec::new(); n_in];
        let mut out_staging: Vec<TOut> = Vec::new();
        let length = plan.length();
        plan.for_each_line(range, |position, offsets| {
            let out_geometry = LineGeometry {
                offset: offsets[n_in],
                stride: plan.line_stride(n_in),
                length,
                tensor_elements: output.tensor_elements,
                tensor_stride: output.tensor_stride,
            };
            // SAFETY: the plan addresses only samples inside each image's
            // extent; output lines are disjoint between threads.
            let inputs: SmallVec<[InLine<'_, TIn>; 4]> = sources
                .iter()
                .zip(in_staging.iter_mut())
                .enumerate()
                .map(|(k, (source, staging))| unsafe {
                    source.line(
                        LineGeometry {
                            offset: offsets[k],
                            stride: plan.line_stride(k),
                            length,
                            tensor_elements: operands[k].tensor_elements,
                            tensor_stride: operands[k].tensor_stride,
                        },
                        staging,
                    )
                })
                .collect();
            let output_line = unsafe { sink.line(out_geometry, &mut out_staging) };
            let mut params = ScanLineParams {
                inputs,
                output: output_line,
                length,
                dimension: dim,
                position,
                thread,
            };
            filter.filter(&mut params)?;
            drop(params);
            unsafe { sink.commit(out_geometry, &out_staging) };
            Ok(())
        })
    })
}

/// General scan: any number of inputs, one output of type `out_type`.
///
/// The output is reforged to the broadcast sizes with `out_tensor` (the
/// first input's tensor shape when `None`). Dimensions along which every
/// input is singleton are computed once and singleton-expanded in the
/// output, unless the output is protected or `no_singleton_expansion` is set.
pub fn scan<TIn, TOut, F>(
    inputs: &[&Image],
    out: &mut Image,
    out_type: DataType,
    out_tensor: Option<TensorShape>,
    filter: &mut F,
    options: ScanOptions,
) -> Result<()>
where
    TIn: Sample,
    TOut: Sample,
    F: ScanLineFilter<TIn, TOut>,
{
    if inputs.is_empty() {
        return Err(FrameError::ArrayParameterWrongLength {
            name: "inputs",
            expected: 1,
            found: 0,
        });
    }
    if inputs.iter().any(|i| !i.is_forged()) {
        return Err(FrameError::NotForged);
    }
    let tas = options.tensor_as_spatial_dim;
    let (mut sizes, operands) = broadcast_operands(inputs, None, tas)?;
    let spatial = if tas { sizes.len() - 1 } else { sizes.len() };
    let out_tensor = out_tensor.unwrap_or(inputs[0].tensor());
    if tas && out_tensor.elements() != sizes[spatial] {
        return Err(FrameError::TensorMismatch(sizes[spatial], out_tensor.elements()));
    }

    let mut expand = Vec::new();
    if !options.no_singleton_expansion && !out.is_protected() {
        for d in 0..spatial {
            if sizes[d] > 1 && operands.iter().all(|o| o.strides[d] == 0) {
                expand.push((d, sizes[d]));
                sizes[d] = 1;
            }
        }
    }
    let sources: Vec<LineSource<TIn>> = inputs
        .iter()
        .map(|img| LineSource::new(img, false))
        .collect::<Result<_>>()?;
    let stored_type = if out.is_protected() && out.is_forged() {
        out.data_type()
    } else {
        out_type
    };
    if !TOut::DATA_TYPE.converts_to(stored_type) {
        return Err(FrameError::UnsupportedConversion {
            from: TOut::DATA_TYPE,
            to: stored_type,
        });
    }
    out.reforge(&sizes[..spatial], out_tensor, out_type)?;

    let output = output_operand(out, tas);
    let sink = LineSink::<TOut>::new(out)?;
    run_lines(&sizes, &sources, &operands, &sink, &output, filter, options)?;
    drop(sink);

    for (d, size) in expand {
        out.expand_singleton_dimension(d, size)?;
    }
    Ok(())
}

/// Scan with the output aliasing the first input.
///
/// `image` keeps its sizes and sample type; `others` are broadcast to it.
/// Requires `options.may_execute_in_place`. Every line of `image` is staged
/// before it is overwritten.
pub fn scan_in_place<TIn, TOut, F>(
    image: &mut Image,
    others: &[&Image],
    filter: &mut F,
    options: ScanOptions,
) -> Result<()>
where
    TIn: Sample,
    TOut: Sample,
    F: ScanLineFilter<TIn, TOut>,
{
    if !options.may_execute_in_place {
        return Err(FrameError::InPlaceNotAllowed);
    }
    if !image.is_forged() || others.iter().any(|i| !i.is_forged()) {
        return Err(FrameError::NotForged);
    }
    if !image.is_writable() {
        return Err(if image.is_singleton_expanded() {
            FrameError::SingletonExpandedWrite
        } else {
            FrameError::SharedData
        });
    }
    let tas = options.tensor_as_spatial_dim;
    let target = image.sizes().to_vec();
    let mut all: Vec<&Image> = Vec::with_capacity(others.len() + 1);
    let own = image.quick_copy();
    all.push(&own);
    all.extend_from_slice(others);
    let broadcast = broadcast_operands(&all, Some(&target), tas);
    drop(all);
    drop(own);
    let (sizes, operands) = broadcast?;
    if sizes.len() != target.len() + usize::from(tas) {
        return Err(FrameError::DimensionalityMismatch {
            expected: target.len(),
            found: sizes.len() - usize::from(tas),
        });
    }
    // The output is `image` itself, so the tensor extent cannot grow.
    if tas && sizes[target.len()] != image.tensor_elements() {
        return Err(FrameError::TensorMismatch(image.tensor_elements(), sizes[target.len()]));
    }

    let aliased = {
        let dt = image.data_type();
        if !dt.converts_to(TIn::DATA_TYPE) {
            return Err(FrameError::UnsupportedConversion {
                from: dt,
                to: TIn::DATA_TYPE,
            });
        }
        dispatch_sample_type!(dt, S => {
            LineSource::<TIn>::aliased_from::<S>(SendPtr(image.origin_ptr_mut::<S>()?))
        })
    };
    let mut sources = vec![aliased];
    for img in others {
        sources.push(LineSource::new(img, false)?);
    }
    let output = output_operand(image, tas);
    let sink = LineSink::<TOut>::new(image)?;
    run_lines(&sizes, &sources, &operands, &sink, &output, filter, options)
}

// ============================================================================
// Pointwise adapters
// ============================================================================

/// Applies a function to every sample (all tensor elements) of one input.
pub struct MonadicLineFilter<F> {
    func: F,
    operations: usize,
}

impl<F> MonadicLineFilter<F> {
    pub fn new(func: F, operations: usize) -> Self {
        Self { func, operations }
    }
}

impl<TIn, TOut, F> ScanLineFilter<TIn, TOut> for MonadicLineFilter<F>
where
    TIn: Sample,
    TOut: Sample,
    F: Fn(TIn) -> TOut + Sync,
{
    fn operations_per_sample(&self) -> usize {
        self.operations
    }

    fn filter(&self, params: &mut ScanLineParams<'_, TIn, TOut>) -> Result<()> {
        let input = &params.inputs[0];
        let te = params.output.tensor_elements();
        for i in 0..params.length {
            for t in 0..te {
                params.output.set_tensor(i, t, (self.func)(input.get_tensor(i, t)));
            }
        }
        Ok(())
    }
}

/// Applies a function to corresponding samples of two inputs.
pub struct DyadicLineFilter<F> {
    func: F,
    operations: usize,
}

impl<F> DyadicLineFilter<F> {
    pub fn new(func: F, operations: usize) -> Self {
        Self { func, operations }
    }
}

impl<TIn, TOut, F> ScanLineFilter<TIn, TOut> for DyadicLineFilter<F>
where
    TIn: Sample,
    TOut: Sample,
    F: Fn(TIn, TIn) -> TOut + Sync,
{
    fn operations_per_sample(&self) -> usize {
        self.operations
    }

    fn filter(&self, params: &mut ScanLineParams<'_, TIn, TOut>) -> Result<()> {
        let (lhs, rhs) = (&params.inputs[0], &params.inputs[1]);
        let te = params.output.tensor_elements();
        for i in 0..params.length {
            for t in 0..te {
                let v = (self.func)(lhs.get_tensor(i, t), rhs.get_tensor(i, t));
                params.output.set_tensor(i, t, v);
            }
        }
        Ok(())
    }
}

/// `out = f(in)` sample by sample, computing in `TIn` and `TOut`.
pub fn scan_monadic<TIn, TOut, F>(
    input: &Image,
    out: &mut Image,
    out_type: DataType,
    func: F,
    options: ScanOptions,
) -> Result<()>
where
    TIn: Sample,
    TOut: Sample,
    F: Fn(TIn) -> TOut + Sync,
{
    let mut filter = MonadicLineFilter::new(func, 1);
    scan::<TIn, TOut, _>(&[input], out, out_type, None, &mut filter, options)
}

/// `out = f(lhs, rhs)` sample by sample with broadcasting.
pub fn scan_dyadic<TIn, TOut, F>(
    lhs: &Image,
    rhs: &Image,
    out: &mut Image,
    out_type: DataType,
    func: F,
    options: ScanOptions,
) -> Result<()>
where
    TIn: Sample,
    TOut: Sample,
    F: Fn(TIn, TIn) -> TOut + Sync,
{
    let mut filter = DyadicLineFilter::new(func, 1);
    scan::<TIn, TOut, _>(&[lhs, rhs], out, out_type, None, &mut filter, options)
}
