//! Rank-1 decomposition of a kernel image into one 1-D filter per axis.

use num_complex::Complex64;
use pixframe_kernel::{FilterSymmetry, OneDimensionalFilter};
use pixframe_view::{col_major_strides, CoordIter, Image};

/// Tolerance, relative to the pivot magnitude, on the reconstructed kernel.
const SEPARATION_TOLERANCE: f64 = 1e-7;
/// Tolerance, relative to the largest tap, for recognizing symmetric factors.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Split `kernel` into an outer product of 1-D filters, one per dimension.
///
/// Pivots on the largest-magnitude element and reads the fibre through it
/// along every axis; the first factor keeps the pivot's scale and the others
/// are normalized by it. Returns `None` when the kernel is not a forged
/// scalar image with at least one dimension, is all zeros, or when the outer
/// product of the fibres does not reproduce it. Symmetric factors come back in compact form with the
/// matching [`FilterSymmetry`] tag.
pub fn separate_filter(kernel: &Image) -> Option<Vec<OneDimensionalFilter>> {
    if !kernel.is_forged() || !kernel.is_scalar() || kernel.number_of_pixels() == 0 {
        return None;
    }
    let sizes = kernel.sizes().to_vec();
    let n = sizes.len();
    if n == 0 {
        return None;
    }
    let strides = col_major_strides(&sizes, 1);
    let values: Vec<Complex64> = CoordIter::new(&sizes)
        .map(|c| kernel.sample::<Complex64>(&c))
        .collect::<Result<_, _>>()
        .ok()?;

    let (pivot_index, pivot) = values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
        .map(|(i, &v)| (i, v))?;
    if pivot.norm() == 0.0 {
        return None;
    }
    let mut pivot_coords = vec![0usize; n];
    let mut rest = pivot_index;
    for d in (0..n).rev() {
        pivot_coords[d] = rest / strides[d] as usize;
        rest %= strides[d] as usize;
    }

    let factors: Vec<Vec<Complex64>> = (0..n)
        .map(|d| {
            let base = pivot_index as isize - pivot_coords[d] as isize * strides[d];
            (0..sizes[d])
                .map(|i| {
                    let v = values[(base + i as isize * strides[d]) as usize];
                    if d == 0 {
                        v
                    } else {
                        v / pivot
                    }
                })
                .collect()
        })
        .collect();

    let limit = SEPARATION_TOLERANCE * pivot.norm();
    for (index, coords) in CoordIter::new(&sizes).enumerate() {
        let mut product = Complex64::new(1.0, 0.0);
        for (d, &c) in coords.iter().enumerate() {
            product *= factors[d][c];
        }
        if (product - values[index]).norm() > limit {
            return None;
        }
    }
    let complex = kernel.data_type().is_complex();
    Some(factors.into_iter().map(|f| compact_filter(f, complex)).collect())
}

fn close(a: Complex64, b: Complex64, tolerance: f64) -> bool {
    (a - b).norm() <= tolerance
}

/// Detect the symmetry of a logical filter and keep its left half.
fn compact_filter(taps: Vec<Complex64>, complex: bool) -> OneDimensionalFilter {
    let len = taps.len();
    let scale = taps.iter().map(|v| v.norm()).fold(0.0, f64::max);
    let tolerance = SYMMETRY_TOLERANCE * scale;
    let pairs = len / 2;
    let matches = |f: &dyn Fn(Complex64) -> Complex64| {
        (0..pairs).all(|i| close(taps[len - 1 - i], f(taps[i]), tolerance))
    };
    let odd_length = len % 2 == 1;
    let symmetry = if len < 2 {
        FilterSymmetry::General
    } else if matches(&|v| v) {
        if odd_length {
            FilterSymmetry::Even
        } else {
            FilterSymmetry::DoubleEven
        }
    } else if matches(&|v| -v) {
        if odd_length {
            FilterSymmetry::Odd
        } else {
            FilterSymmetry::DoubleOdd
        }
    } else if complex && matches(&|v| v.conj()) {
        if odd_length {
            FilterSymmetry::Conj
        } else {
            FilterSymmetry::DoubleConj
        }
    } else {
        FilterSymmetry::General
    };
    let stored = match symmetry {
        FilterSymmetry::General => len,
        _ => len - pairs,
    };
    let filter = if complex {
        OneDimensionalFilter::from_complex(taps[..stored].to_vec())
    } else {
        OneDimensionalFilter::new(taps[..stored].iter().map(|v| v.re).collect())
    };
    filter.with_symmetry(symmetry)
}
