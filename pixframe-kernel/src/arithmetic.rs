//! Sample-wise arithmetic built on the scan strategy.
//!
//! When both operands and the output share a type the operation runs in that
//! type: saturating for integers, logical for binary. Otherwise it runs in
//! the common flex type of the operands and the result is converted into the
//! requested output type.

use num_complex::{Complex32, Complex64};

use pixframe_view::{dispatch_sample_type, DataType, Image, Sample};

use crate::scan::{scan_dyadic, scan_in_place, scan_monadic, DyadicLineFilter, ScanOptions};
use crate::Result;

/// Arithmetic with the overflow behaviour of each sample type.
pub(crate) trait Arith: Sample {
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn mul(self, other: Self) -> Self;
}

macro_rules! impl_arith_saturating {
    ($($t:ty),*) => {
        $(
            impl Arith for $t {
                #[inline(always)]
                fn add(self, other: Self) -> Self {
                    self.saturating_add(other)
                }

                #[inline(always)]
                fn sub(self, other: Self) -> Self {
                    self.saturating_sub(other)
                }

                #[inline(always)]
                fn mul(self, other: Self) -> Self {
                    self.saturating_mul(other)
                }
            }
        )*
    };
}

macro_rules! impl_arith_plain {
    ($($t:ty),*) => {
        $(
            impl Arith for $t {
                #[inline(always)]
                fn add(self, other: Self) -> Self {
                    self + other
                }

                #[inline(always)]
                fn sub(self, other: Self) -> Self {
                    self - other
                }

                #[inline(always)]
                fn mul(self, other: Self) -> Self {
                    self * other
                }
            }
        )*
    };
}

impl_arith_saturating!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_arith_plain!(f32, f64, Complex32, Complex64);

impl Arith for bool {
    #[inline(always)]
    fn add(self, other: Self) -> Self {
        self | other
    }

    #[inline(always)]
    fn sub(self, other: Self) -> Self {
        self & !other
    }

    #[inline(always)]
    fn mul(self, other: Self) -> Self {
        self & other
    }
}

fn compute_type(lhs: DataType, rhs: DataType, out: DataType) -> DataType {
    if lhs == rhs && rhs == out {
        lhs
    } else {
        lhs.suggest_arithmetic(rhs)
    }
}

#[derive(Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mul,
}

fn dyadic(lhs: &Image, rhs: &Image, out: &mut Image, out_type: DataType, op: Op) -> Result<()> {
    let compute = compute_type(lhs.data_type(), rhs.data_type(), out_type);
    let options = ScanOptions::default();
    dispatch_sample_type!(compute, T => match op {
        Op::Add => scan_dyadic::<T, T, _>(lhs, rhs, out, out_type, <T as Arith>::add, options),
        Op::Sub => scan_dyadic::<T, T, _>(lhs, rhs, out, out_type, <T as Arith>::sub, options),
        Op::Mul => scan_dyadic::<T, T, _>(lhs, rhs, out, out_type, <T as Arith>::mul, options),
    })
}

/// `out = lhs + rhs`, with singleton broadcasting.
pub fn add(lhs: &Image, rhs: &Image, out: &mut Image, out_type: DataType) -> Result<()> {
    dyadic(lhs, rhs, out, out_type, Op::Add)
}

/// `out = lhs - rhs`.
pub fn subtract(lhs: &Image, rhs: &Image, out: &mut Image, out_type: DataType) -> Result<()> {
    dyadic(lhs, rhs, out, out_type, Op::Sub)
}

/// `out = lhs * rhs`, sample by sample (not a matrix product of tensors).
pub fn multiply_samplewise(lhs: &Image, rhs: &Image, out: &mut Image, out_type: DataType) -> Result<()> {
    dyadic(lhs, rhs, out, out_type, Op::Mul)
}

/// `image *= other`, writing into `image`'s own buffer and type.
pub fn multiply_samplewise_in_place(image: &mut Image, other: &Image) -> Result<()> {
    let compute = compute_type(image.data_type(), other.data_type(), image.data_type());
    dispatch_sample_type!(compute, T => {
        let mut filter = DyadicLineFilter::new(<T as Arith>::mul, 1);
        scan_in_place::<T, T, _>(image, &[other], &mut filter, ScanOptions::in_place())
    })
}

/// Real component of a complex image; a plain copy for real images.
pub fn real_part(input: &Image, out: &mut Image) -> Result<()> {
    let options = ScanOptions {
        no_singleton_expansion: true,
        ..ScanOptions::default()
    };
    match input.data_type() {
        DataType::C32 => scan_monadic::<Complex32, f32, _>(input, out, DataType::F32, |c| c.re, options),
        DataType::C64 => scan_monadic::<Complex64, f64, _>(input, out, DataType::F64, |c| c.re, options),
        other => convert(input, out, other),
    }
}

/// Contiguous copy of `input` with samples converted to `data_type`.
///
/// Views (windows, singleton-expanded images) become normal images.
pub fn convert(input: &Image, out: &mut Image, data_type: DataType) -> Result<()> {
    let options = ScanOptions {
        no_singleton_expansion: true,
        ..ScanOptions::default()
    };
    dispatch_sample_type!(input.data_type(), T => {
        scan_monadic::<T, T, _>(input, out, data_type, |x| x, options)
    })
}
