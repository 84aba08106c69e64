//! Full strategy: one neighborhood kernel, one pass.
//!
//! The input is boundary-extended by the reach of the kernel's
//! [`PixelTable`] into a working image of the flex type `T`, the table is
//! compiled once against that image's strides, and every output line is
//! computed from the neighborhood of its pixels.

use std::marker::PhantomData;

use num_traits::One;
use pixframe_view::{dispatch_flex_type, DataType, Flex, FrameError, Image, Sample};

use crate::arithmetic::convert;
use crate::boundary::{extend_image, resolve_boundary_conditions, BoundaryCondition};
use crate::line_buffer::OutLine;
use crate::lines::LinePlan;
use crate::pixel_table::{Kernel, PixelTableOffsets};
use crate::threading::{partition, run_partitioned, thread_count, SendPtr};
use crate::Result;

/// Read access to the neighborhoods of one line of pixels.
///
/// Only samples covered by the compiled table can be reached, and those
/// always exist in the extended working image.
pub struct Neighborhood<'a, T> {
    ptr: *const T,
    stride: isize,
    length: usize,
    table: &'a PixelTableOffsets,
    _marker: PhantomData<&'a T>,
}

impl<'a, T: Copy> Neighborhood<'a, T> {
    /// Number of pixels on the line, the range of the first index of
    /// [`pixel`](Self::pixel).
    pub fn line_length(&self) -> usize {
        self.length
    }

    /// Number of pixels in each neighborhood, the range of the second index
    /// of [`pixel`](Self::pixel).
    pub fn number_of_pixels(&self) -> usize {
        self.table.number_of_pixels()
    }

    pub fn table(&self) -> &'a PixelTableOffsets {
        self.table
    }

    /// Table pixel `k` of the neighborhood of line pixel `i`.
    #[inline]
    pub fn pixel(&self, i: usize, k: usize) -> T {
        assert!(i < self.length, "line index out of bounds");
        // SAFETY: the working image extends past the line by the table reach.
        unsafe { *self.ptr.offset(i as isize * self.stride + self.table.offsets[k]) }
    }

    /// Sample `p` of run `r` swept along the line: the run of pixel `i`
    /// covers `p` in `i..i + run_length`.
    #[inline]
    pub fn run_sample(&self, r: usize, p: usize) -> T {
        let (offset, len) = self.table.runs[r];
        assert!(p + 1 < self.length + len, "run index out of bounds");
        // SAFETY: as for `pixel`, the last pixel of the run of the last line
        // pixel is within the extension.
        unsafe { *self.ptr.offset(offset + p as isize * self.stride) }
    }
}

/// One line as seen by a [`FullLineFilter`].
pub struct FullLineParams<'a, T> {
    pub input: Neighborhood<'a, T>,
    pub output: OutLine<'a, T>,
    pub length: usize,
    pub dimension: usize,
    pub position: &'a [usize],
    pub thread: usize,
}

/// Per-line callback of the full strategy.
pub trait FullLineFilter<T>: Sync {
    /// Called once per invocation with the compiled table, before any line
    /// is processed.
    fn set_number_of_threads(&mut self, _threads: usize, _table: &PixelTableOffsets) {}

    fn filter(&self, params: &mut FullLineParams<'_, T>) -> Result<()>;
}

/// The dimension along which the kernel is longest (first one on ties).
fn kernel_processing_dim(sizes: &[usize]) -> usize {
    let mut best = 0;
    for (d, &s) in sizes.iter().enumerate() {
        if s > sizes[best] {
            best = d;
        }
    }
    best
}

/// Run `filter` over every pixel of `input` with the neighborhood `kernel`.
pub fn full<T, F>(
    input: &Image,
    out: &mut Image,
    out_type: DataType,
    bc: &[BoundaryCondition],
    kernel: &Kernel,
    filter: &mut F,
) -> Result<()>
where
    T: Flex,
    F: FullLineFilter<T>,
{
    if !input.is_forged() {
        return Err(FrameError::NotForged);
    }
    let n = input.dimensionality();
    if n == 0 {
        return Err(FrameError::DimensionalityMismatch { expected: 1, found: 0 });
    }
    if kernel.dimensionality() > n {
        return Err(FrameError::DimensionalityMismatch {
            expected: n,
            found: kernel.dimensionality(),
        });
    }
    for (d, &k) in kernel.sizes().iter().enumerate() {
        if k > input.size(d) {
            return Err(FrameError::KernelTooLarge {
                dim: d,
                kernel: k,
                image: input.size(d),
            });
        }
    }
    let bc = resolve_boundary_conditions(bc, n)?;
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

    let mut ksizes = kernel.sizes().to_vec();
    ksizes.resize(n, 1);
    let dim = kernel_processing_dim(&ksizes);
    let table = kernel.pixel_table(n, dim)?;
    let (before, after) = table.reach();
    let ext = extend_image::<T>(input, &before[..n], &after[..n], &bc)?;
    let offsets = table.offsets(ext.strides());
    let mut result = Image::new(input.sizes(), input.tensor(), T::DATA_TYPE);

    let mut loop_sizes = input.sizes().to_vec();
    let mut ext_strides = ext.strides().to_vec();
    let mut res_strides = result.strides().to_vec();
    loop_sizes.push(input.tensor_elements());
    ext_strides.push(ext.tensor_stride());
    res_strides.push(result.tensor_stride());
    if input.number_of_samples() == 0 {
        return finish::<T>(result, out, out_type);
    }
    let plan = LinePlan::new(&loop_sizes, dim, &[&ext_strides, &res_strides]);
    let threads = thread_count(
        plan.lines(),
        input.number_of_samples().saturating_mul(offsets.number_of_pixels()),
        true,
    );
    log::trace!(
        "full: {} table pixels in {} runs, {} lines along dimension {} on {} thread(s)",
        offsets.number_of_pixels(),
        offsets.runs.len(),
        plan.lines(),
        dim,
        threads
    );
    filter.set_number_of_threads(threads, &offsets);
    let filter: &F = filter;

    let ext_base: isize = before.iter().zip(ext.strides()).map(|(&b, &s)| b as isize * s).sum();
    let ext_origin = SendPtr::from_const(ext.origin_ptr::<T>()?);
    let res_origin = SendPtr(result.origin_ptr_mut::<T>()?);
    let ranges = partition(plan.lines(), threads);
    let length = plan.length();
    let table = &offsets;
    run_partitioned(&ranges, |thread, range| {
        plan.for_each_line(range, |position, line_offsets| {
            // SAFETY: `ext` covers the line plus the table reach on every
            // side; `result` is exclusively owned and lines are disjoint.
            let (input, output) = unsafe {
                (
                    Neighborhood {
                        ptr: ext_origin.as_const().offset(ext_base + line_offsets[0]),
                        stride: plan.line_stride(0),
                        length,
                        table,
                        _marker: PhantomData,
                    },
                    OutLine::from_raw(
                        res_origin.as_ptr().offset(line_offsets[1]),
                        length,
                        plan.line_stride(1),
                        1,
                        1,
                    ),
                )
            };
            let mut params = FullLineParams {
                input,
                output,
                length,
                dimension: dim,
                position,
                thread,
            };
            filter.filter(&mut params)
        })
    })?;
    finish::<T>(result, out, out_type)
}

fn finish<T: Flex>(result: Image, out: &mut Image, out_type: DataType) -> Result<()> {
    if !out.is_protected() && out_type == T::DATA_TYPE {
        *out = result;
        Ok(())
    } else {
        convert(&result, out, out_type)
    }
}

// ============================================================================
// Consumers
// ============================================================================

struct WeightedLineFilter<T> {
    weights: Vec<T>,
}

impl<T: Flex> FullLineFilter<T> for WeightedLineFilter<T> {
    fn set_number_of_threads(&mut self, _threads: usize, table: &PixelTableOffsets) {
        self.weights = table.weights.to_flex(table.number_of_pixels());
    }

    fn filter(&self, params: &mut FullLineParams<'_, T>) -> Result<()> {
        for i in 0..params.length {
            let mut sum = T::zero();
            for (k, &w) in self.weights.iter().enumerate() {
                sum += w * params.input.pixel(i, k);
            }
            params.output.set(i, sum);
        }
        Ok(())
    }
}

/// Sum (or mean) over a footprint, updated incrementally along each run.
struct RunningSumLineFilter<T> {
    scale: T,
}

impl<T: Flex> FullLineFilter<T> for RunningSumLineFilter<T> {
    fn filter(&self, params: &mut FullLineParams<'_, T>) -> Result<()> {
        let input = &params.input;
        let table = input.table();
        let mut sum = T::zero();
        for k in 0..input.number_of_pixels() {
            sum += input.pixel(0, k);
        }
        params.output.set(0, sum * self.scale);
        for i in 1..params.length {
            for (r, &(_, len)) in table.runs.iter().enumerate() {
                sum += input.run_sample(r, i + len - 1) - input.run_sample(r, i - 1);
            }
            params.output.set(i, sum * self.scale);
        }
        Ok(())
    }
}

/// Convolution with an arbitrary kernel over its full neighborhood.
///
/// Binary kernels reduce to an unweighted sum over the footprint. Complex
/// weights promote the computation to the complex flex type of the input.
pub fn general_convolution(input: &Image, kernel: &Kernel, out: &mut Image, bc: &[BoundaryCondition]) -> Result<()> {
    if !input.is_forged() {
        return Err(FrameError::NotForged);
    }
    let kernel = kernel.clone().mirrored();
    let compute = if kernel.has_complex_weights() {
        input.data_type().suggest_complex()
    } else {
        input.data_type().suggest_flex()
    };
    log::debug!(
        "general convolution in {} with {} kernel",
        compute,
        if kernel.is_binary() { "binary" } else { "weighted" }
    );
    dispatch_flex_type!(compute, "general convolution", T => {
        if kernel.is_binary() {
            let mut filter = RunningSumLineFilter { scale: <T as One>::one() };
            full::<T, _>(input, out, compute, bc, &kernel, &mut filter)
        } else {
            let mut filter = WeightedLineFilter::<T> { weights: Vec::new() };
            full::<T, _>(input, out, compute, bc, &kernel, &mut filter)
        }
    })
}

/// Mean over the footprint of `kernel` (its non-zero pixels when weighted).
pub fn uniform(input: &Image, kernel: &Kernel, out: &mut Image, bc: &[BoundaryCondition]) -> Result<()> {
    if !input.is_forged() {
        return Err(FrameError::NotForged);
    }
    let kernel = kernel.clone().mirrored();
    let n = input.dimensionality().max(kernel.dimensionality());
    let pixels = kernel.pixel_table(n, 0)?.number_of_pixels();
    if pixels == 0 {
        return Err(FrameError::InvalidFilter("uniform filter footprint is empty".into()));
    }
    let compute = input.data_type().suggest_flex();
    dispatch_flex_type!(compute, "uniform filter", T => {
        let mut filter = RunningSumLineFilter { scale: <T as Sample>::from_f64(1.0 / pixels as f64) };
        full::<T, _>(input, out, compute, bc, &kernel, &mut filter)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pixframe_view::CoordIter;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_image(sizes: &[usize], seed: u64) -> Image {
        let mut rng = StdRng::seed_from_u64(seed);
        Image::from_fn(sizes, |_| rng.gen_range(0.0f64..1.0))
    }

    #[test]
    fn test_weighted_convolution_definition() {
        // 1-D, kernel [1, 2, 3] with origin 1: out[x] = 1·in[x+1] + 2·in[x] + 3·in[x-1].
        let img = Image::from_vec(&[5], vec![1.0f64, 0.0, 0.0, 0.0, 2.0]).unwrap();
        let kernel = Kernel::new(Image::from_vec(&[3], vec![1.0f64, 2.0, 3.0]).unwrap()).unwrap();
        let mut out = Image::default();
        general_convolution(&img, &kernel, &mut out, &[BoundaryCondition::AddZeros]).unwrap();
        let v: Vec<f64> = (0..5).map(|i| out.sample::<f64>(&[i]).unwrap()).collect();
        assert_eq!(v, vec![2.0, 3.0, 0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_binary_equals_weighted_ones() {
        let img = random_image(&[15, 12], 21);
        let mask = vec![false, true, false, true, true, true, false, true, true];
        let ones: Vec<f64> = mask.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        let binary = Kernel::new(Image::from_vec(&[3, 3], mask).unwrap()).unwrap();
        let weighted = Kernel::new(Image::from_vec(&[3, 3], ones).unwrap()).unwrap();
        let (mut a, mut b) = (Image::default(), Image::default());
        general_convolution(&img, &binary, &mut a, &[]).unwrap();
        general_convolution(&img, &weighted, &mut b, &[]).unwrap();
        for c in CoordIter::new(&[15, 12]) {
            assert_abs_diff_eq!(a.sample::<f64>(&c).unwrap(), b.sample::<f64>(&c).unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_uniform_is_mean() {
        let img = random_image(&[9, 7], 4);
        let footprint = Kernel::new(Image::from_fn(&[3, 2], |_| true)).unwrap();
        let mut mean = Image::default();
        uniform(&img, &footprint, &mut mean, &[BoundaryCondition::Periodic]).unwrap();
        let mut sum = Image::default();
        general_convolution(&img, &footprint, &mut sum, &[BoundaryCondition::Periodic]).unwrap();
        for c in CoordIter::new(&[9, 7]) {
            assert_abs_diff_eq!(
                mean.sample::<f64>(&c).unwrap() * 6.0,
                sum.sample::<f64>(&c).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_zero_weights_are_skipped() {
        let img = random_image(&[8, 8], 2);
        let sparse = Image::from_fn(&[5, 5], |c| if c[0] == 2 || c[1] == 2 { 0.5 } else { 0.0 });
        let kernel = Kernel::new(sparse).unwrap();
        assert_eq!(kernel.pixel_table(2, 0).unwrap().number_of_pixels(), 9);
        let dense = kernel.clone().keep_zeros();
        let (mut a, mut b) = (Image::default(), Image::default());
        general_convolution(&img, &kernel, &mut a, &[]).unwrap();
        general_convolution(&img, &dense, &mut b, &[]).unwrap();
        for c in CoordIter::new(&[8, 8]) {
            assert_abs_diff_eq!(a.sample::<f64>(&c).unwrap(), b.sample::<f64>(&c).unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_complex_kernel_promotes() {
        use num_complex::Complex64;
        let img = Image::from_vec(&[3], vec![1.0f32, 2.0, 3.0]).unwrap();
        let kernel = Kernel::new(Image::from_vec(&[1], vec![Complex64::new(0.0, 2.0)]).unwrap()).unwrap();
        let mut out = Image::default();
        general_convolution(&img, &kernel, &mut out, &[]).unwrap();
        assert_eq!(out.data_type(), DataType::C32);
        assert_eq!(out.sample::<Complex64>(&[1]).unwrap(), Complex64::new(0.0, 4.0));
    }

    #[test]
    fn test_kernel_validation() {
        let img = random_image(&[4, 4], 0);
        let mut out = Image::default();
        let big = Kernel::new(Image::from_fn(&[5, 1], |_| 1.0f64)).unwrap();
        assert!(matches!(
            general_convolution(&img, &big, &mut out, &[]),
            Err(FrameError::KernelTooLarge { dim: 0, kernel: 5, image: 4 })
        ));
        let deep = Kernel::new(Image::from_fn(&[1, 1, 2], |_| 1.0f64)).unwrap();
        assert!(matches!(
            general_convolution(&img, &deep, &mut out, &[]),
            Err(FrameError::DimensionalityMismatch { .. })
        ));
        assert!(!out.is_forged());
    }

    #[test]
    fn test_custom_line_filter_sees_table_once() {
        struct MaxFilter {
            calls: usize,
        }
        impl FullLineFilter<f64> for MaxFilter {
            fn set_number_of_threads(&mut self, _threads: usize, table: &PixelTableOffsets) {
                self.calls += 1;
                assert_eq!(table.number_of_pixels(), 3);
            }
            fn filter(&self, params: &mut FullLineParams<'_, f64>) -> Result<()> {
                for i in 0..params.length {
                    let m = (0..3).map(|k| params.input.pixel(i, k)).fold(f64::MIN, f64::max);
                    params.output.set(i, m);
                }
                Ok(())
            }
        }
        let img = Image::from_vec(&[5], vec![1.0f64, 5.0, 2.0, 0.0, 3.0]).unwrap();
        let kernel = Kernel::new(Image::from_fn(&[3], |_| true)).unwrap();
        let mut filter = MaxFilter { calls: 0 };
        let mut out = Image::default();
        full::<f64, _>(&img, &mut out, DataType::F64, &[BoundaryCondition::AddMinValue], &kernel, &mut filter)
            .unwrap();
        assert_eq!(filter.calls, 1);
        let v: Vec<f64> = (0..5).map(|i| out.sample::<f64>(&[i]).unwrap()).collect();
        assert_eq!(v, vec![5.0, 5.0, 5.0, 3.0, 3.0]);
    }

    #[test]
    fn test_neighborhood_pixel_count_differs_from_line_length() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        struct Shape {
            pixels: AtomicUsize,
            line: AtomicUsize,
        }
        impl FullLineFilter<f64> for Shape {
            fn filter(&self, params: &mut FullLineParams<'_, f64>) -> Result<()> {
                self.pixels.store(params.input.number_of_pixels(), Ordering::Relaxed);
                self.line.store(params.input.line_length(), Ordering::Relaxed);
                for i in 0..params.length {
                    params.output.set(i, params.input.pixel(i, params.input.number_of_pixels() - 1));
                }
                Ok(())
            }
        }
        let img = random_image(&[15, 12], 8);
        let cross = Kernel::new(Image::from_fn(&[3, 5], |c| c[0] == 1 || c[1] == 2)).unwrap();
        let mut filter = Shape {
            pixels: AtomicUsize::new(0),
            line: AtomicUsize::new(0),
        };
        let mut out = Image::default();
        full::<f64, _>(&img, &mut out, DataType::F64, &[], &cross, &mut filter).unwrap();
        assert_eq!(filter.pixels.load(Ordering::Relaxed), 7);
        // Lines run along the longest kernel dimension.
        assert_eq!(filter.line.load(Ordering::Relaxed), 12);
    }
}
