//! Sample types known at run time and their compile-time counterparts.
//!
//! An [`crate::Image`] carries a [`DataType`] tag. Strategies discover the tag
//! once at their entry point and instantiate a monomorphized line filter for
//! the matching Rust type through [`dispatch_sample_type!`] or
//! [`dispatch_flex_type!`], so no per-sample branching happens inside loops.

use std::fmt;

use num_complex::{Complex32, Complex64};
use num_traits::{Float, One, Zero};

use crate::buffer::SampleBuffer;

// ============================================================================
// DataType
// ============================================================================

/// Tag identifying the sample type stored in an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bin,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    C32,
    C64,
}

impl DataType {
    pub const ALL: [DataType; 13] = [
        DataType::Bin,
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::U64,
        DataType::I8,
        DataType::I16,
        DataType::I32,
        DataType::I64,
        DataType::F32,
        DataType::F64,
        DataType::C32,
        DataType::C64,
    ];

    pub fn is_binary(self) -> bool {
        self == DataType::Bin
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DataType::C32 | DataType::C64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn is_integer(self) -> bool {
        !(self.is_binary() || self.is_float() || self.is_complex())
    }

    /// Floating-point or complex: the types computations are carried out in.
    pub fn is_flex(self) -> bool {
        self.is_float() || self.is_complex()
    }

    /// Size of one sample in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DataType::Bin | DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 | DataType::C32 => 8,
            DataType::C64 => 16,
        }
    }

    /// The real type with the same precision as a complex type.
    pub fn real(self) -> DataType {
        match self {
            DataType::C32 => DataType::F32,
            DataType::C64 => DataType::F64,
            other => other,
        }
    }

    /// Floating-point type to compute in: small integers and binary go to
    /// `F32`, wide integers to `F64`, flex types are kept.
    pub fn suggest_flex(self) -> DataType {
        match self {
            DataType::Bin | DataType::U8 | DataType::U16 | DataType::I8 | DataType::I16 => {
                DataType::F32
            }
            DataType::U32 | DataType::U64 | DataType::I32 | DataType::I64 => DataType::F64,
            other => other,
        }
    }

    /// Complex type with at least the precision of [`DataType::suggest_flex`].
    pub fn suggest_complex(self) -> DataType {
        match self.suggest_flex() {
            DataType::F32 | DataType::C32 => DataType::C32,
            _ => DataType::C64,
        }
    }

    /// Common flex type for combining samples of type `self` and `other`.
    pub fn suggest_arithmetic(self, other: DataType) -> DataType {
        let a = self.suggest_flex();
        let b = other.suggest_flex();
        let double = a == DataType::F64 || a == DataType::C64 || b == DataType::F64 || b == DataType::C64;
        let complex = a.is_complex() || b.is_complex();
        match (complex, double) {
            (false, false) => DataType::F32,
            (false, true) => DataType::F64,
            (true, false) => DataType::C32,
            (true, true) => DataType::C64,
        }
    }

    /// Whether samples of type `self` can be converted to `to` without
    /// discarding an imaginary part.
    pub fn converts_to(self, to: DataType) -> bool {
        !(self.is_complex() && !to.is_complex())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bin => "BIN",
            DataType::U8 => "UINT8",
            DataType::U16 => "UINT16",
            DataType::U32 => "UINT32",
            DataType::U64 => "UINT64",
            DataType::I8 => "SINT8",
            DataType::I16 => "SINT16",
            DataType::I32 => "SINT32",
            DataType::I64 => "SINT64",
            DataType::F32 => "SFLOAT",
            DataType::F64 => "DFLOAT",
            DataType::C32 => "SCOMPLEX",
            DataType::C64 => "DCOMPLEX",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Sample: every storable type
// ============================================================================

/// A type that can be stored in a [`SampleBuffer`].
///
/// Conversions go through `f64` (or `Complex64` between complex types):
/// integers round to nearest and saturate, `bool` is "non-zero".
pub trait Sample: Copy + Send + Sync + Default + PartialEq + fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    fn to_f64(self) -> f64;
    fn to_c64(self) -> Complex64;
    fn from_f64(value: f64) -> Self;
    fn from_c64(value: Complex64) -> Self;

    fn slice(buffer: &SampleBuffer) -> Option<&[Self]>;
    fn slice_mut(buffer: &mut SampleBuffer) -> Option<&mut [Self]>;
    fn into_buffer(data: Vec<Self>) -> SampleBuffer;
}

/// Convert one sample between two storable types.
#[inline(always)]
pub fn convert<S: Sample, T: Sample>(value: S) -> T {
    if S::DATA_TYPE.is_complex() && T::DATA_TYPE.is_complex() {
        T::from_c64(value.to_c64())
    } else {
        T::from_f64(value.to_f64())
    }
}

macro_rules! impl_sample_buffer_access {
    ($t:ty, $variant:ident) => {
        fn slice(buffer: &SampleBuffer) -> Option<&[Self]> {
            match buffer {
                SampleBuffer::$variant(v) => Some(v.as_slice()),
                _ => None,
            }
        }

        fn slice_mut(buffer: &mut SampleBuffer) -> Option<&mut [Self]> {
            match buffer {
                SampleBuffer::$variant(v) => Some(v.as_mut_slice()),
                _ => None,
            }
        }

        fn into_buffer(data: Vec<Self>) -> SampleBuffer {
            SampleBuffer::$variant(data)
        }
    };
}

macro_rules! impl_sample_integer {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Sample for $t {
                const DATA_TYPE: DataType = DataType::$variant;

                #[inline(always)]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline(always)]
                fn to_c64(self) -> Complex64 {
                    Complex64::new(self as f64, 0.0)
                }

                // `as` from float saturates and maps NaN to 0.
                #[inline(always)]
                fn from_f64(value: f64) -> Self {
                    value.round() as $t
                }

                #[inline(always)]
                fn from_c64(value: Complex64) -> Self {
                    value.re.round() as $t
                }

                impl_sample_buffer_access!($t, $variant);
            }
        )*
    };
}

impl_sample_integer!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
);

impl Sample for bool {
    const DATA_TYPE: DataType = DataType::Bin;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    #[inline(always)]
    fn to_c64(self) -> Complex64 {
        Complex64::new(self.to_f64(), 0.0)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value != 0.0
    }

    #[inline(always)]
    fn from_c64(value: Complex64) -> Self {
        value.re != 0.0 || value.im != 0.0
    }

    impl_sample_buffer_access!(bool, Bin);
}

impl Sample for f32 {
    const DATA_TYPE: DataType = DataType::F32;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline(always)]
    fn to_c64(self) -> Complex64 {
        Complex64::new(self as f64, 0.0)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline(always)]
    fn from_c64(value: Complex64) -> Self {
        value.re as f32
    }

    impl_sample_buffer_access!(f32, F32);
}

impl Sample for f64 {
    const DATA_TYPE: DataType = DataType::F64;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline(always)]
    fn to_c64(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline(always)]
    fn from_c64(value: Complex64) -> Self {
        value.re
    }

    impl_sample_buffer_access!(f64, F64);
}

impl Sample for Complex32 {
    const DATA_TYPE: DataType = DataType::C32;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self.re as f64
    }

    #[inline(always)]
    fn to_c64(self) -> Complex64 {
        Complex64::new(self.re as f64, self.im as f64)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        Complex32::new(value as f32, 0.0)
    }

    #[inline(always)]
    fn from_c64(value: Complex64) -> Self {
        Complex32::new(value.re as f32, value.im as f32)
    }

    impl_sample_buffer_access!(Complex32, C32);
}

impl Sample for Complex64 {
    const DATA_TYPE: DataType = DataType::C64;

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self.re
    }

    #[inline(always)]
    fn to_c64(self) -> Complex64 {
        self
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    #[inline(always)]
    fn from_c64(value: Complex64) -> Self {
        value
    }

    impl_sample_buffer_access!(Complex64, C64);
}

// ============================================================================
// Flex: types computations are carried out in
// ============================================================================

/// Floating-point or complex sample type used as the working type of the
/// separable and full strategies.
pub trait Flex:
    Sample
    + Zero
    + One
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Neg<Output = Self>
    + std::ops::AddAssign
    + std::ops::SubAssign
{
    type Real: Float + Sample + Send + Sync;

    fn conj(self) -> Self;

    fn scale(self, factor: Self::Real) -> Self;

    fn from_real(value: Self::Real) -> Self;

    fn real_part(self) -> Self::Real;

    /// Largest representable value, `None` for unordered (complex) types.
    fn max_value() -> Option<Self>;

    /// Smallest representable value, `None` for unordered (complex) types.
    fn min_value() -> Option<Self>;
}

macro_rules! impl_flex_real {
    ($($t:ty),*) => {
        $(
            impl Flex for $t {
                type Real = $t;

                #[inline(always)]
                fn conj(self) -> Self {
                    self
                }

                #[inline(always)]
                fn scale(self, factor: $t) -> Self {
                    self * factor
                }

                #[inline(always)]
                fn from_real(value: $t) -> Self {
                    value
                }

                #[inline(always)]
                fn real_part(self) -> $t {
                    self
                }

                fn max_value() -> Option<Self> {
                    Some(<$t>::MAX)
                }

                fn min_value() -> Option<Self> {
                    Some(<$t>::MIN)
                }
            }
        )*
    };
}

macro_rules! impl_flex_complex {
    ($($t:ident => $r:ty),*) => {
        $(
            impl Flex for $t {
                type Real = $r;

                #[inline(always)]
                fn conj(self) -> Self {
                    num_complex::Complex::conj(&self)
                }

                #[inline(always)]
                fn scale(self, factor: $r) -> Self {
                    self * factor
                }

                #[inline(always)]
                fn from_real(value: $r) -> Self {
                    $t::new(value, 0.0)
                }

                #[inline(always)]
                fn real_part(self) -> $r {
                    self.re
                }

                fn max_value() -> Option<Self> {
                    None
                }

                fn min_value() -> Option<Self> {
                    None
                }
            }
        )*
    };
}

impl_flex_real!(f32, f64);
impl_flex_complex!(Complex32 => f32, Complex64 => f64);

// ============================================================================
// Dispatch macros
// ============================================================================

/// Run `$body` with `$t` bound to the Rust type matching a [`DataType`].
///
/// ```
/// use pixframe_view::{dispatch_sample_type, DataType, Sample};
///
/// let dt = DataType::U16;
/// let bytes = dispatch_sample_type!(dt, T => std::mem::size_of::<T>());
/// assert_eq!(bytes, 2);
/// ```
#[macro_export]
macro_rules! dispatch_sample_type {
    ($dt:expr, $t:ident => $body:expr) => {
        match $dt {
            $crate::DataType::Bin => {
                #[allow(dead_code)]
                type $t = bool;
                $body
            }
            $crate::DataType::U8 => {
                #[allow(dead_code)]
                type $t = u8;
                $body
            }
            $crate::DataType::U16 => {
                #[allow(dead_code)]
                type $t = u16;
                $body
            }
            $crate::DataType::U32 => {
                #[allow(dead_code)]
                type $t = u32;
                $body
            }
            $crate::DataType::U64 => {
                #[allow(dead_code)]
                type $t = u64;
                $body
            }
            $crate::DataType::I8 => {
                #[allow(dead_code)]
                type $t = i8;
                $body
            }
            $crate::DataType::I16 => {
                #[allow(dead_code)]
                type $t = i16;
                $body
            }
            $crate::DataType::I32 => {
                #[allow(dead_code)]
                type $t = i32;
                $body
            }
            $crate::DataType::I64 => {
                #[allow(dead_code)]
                type $t = i64;
                $body
            }
            $crate::DataType::F32 => {
                #[allow(dead_code)]
                type $t = f32;
                $body
            }
            $crate::DataType::F64 => {
                #[allow(dead_code)]
                type $t = f64;
                $body
            }
            $crate::DataType::C32 => {
                #[allow(dead_code)]
                type $t = $crate::num_complex::Complex32;
                $body
            }
            $crate::DataType::C64 => {
                #[allow(dead_code)]
                type $t = $crate::num_complex::Complex64;
                $body
            }
        }
    };
}

/// Run `$body` (which must evaluate to a `Result`) with `$t` bound to the
/// flex type matching a [`DataType`]. Non-flex tags yield
/// [`crate::FrameError::UnsupportedDataType`].
#[macro_export]
macro_rules! dispatch_flex_type {
    ($dt:expr, $op:expr, $t:ident => $body:expr) => {
        match $dt {
            $crate::DataType::F32 => {
                #[allow(dead_code)]
                type $t = f32;
                $body
            }
            $crate::DataType::F64 => {
                #[allow(dead_code)]
                type $t = f64;
                $body
            }
            $crate::DataType::C32 => {
                #[allow(dead_code)]
                type $t = $crate::num_complex::Complex32;
                $body
            }
            $crate::DataType::C64 => {
                #[allow(dead_code)]
                type $t = $crate::num_complex::Complex64;
                $body
            }
            other => Err(::core::convert::From::from(
                $crate::FrameError::UnsupportedDataType {
                    data_type: other,
                    operation: $op,
                },
            )),
        }
    };
}
