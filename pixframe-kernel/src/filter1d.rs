//! One-dimensional filters for the separable strategy.
//!
//! A filter stores only its non-redundant taps plus a [`FilterSymmetry`]
//! tag. The logical filter `F` of length `L` and origin `o` defines
//! `out[i] = Σ_j F[j]·in[i + o − j]`; the symmetric kinds fold the two
//! mirrored halves so each tap is multiplied once.

use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;
use pixframe_view::{Flex, FrameError};

use crate::line_buffer::OutLine;
use crate::Result;

/// Tap pattern of a [`OneDimensionalFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterSymmetry {
    /// All taps stored.
    #[default]
    General,
    /// Odd length, `F[o + k] == F[o - k]`.
    Even,
    /// Odd length, `F[o + k] == -F[o - k]`.
    Odd,
    /// Odd length, `F[o + k] == conj(F[o - k])`.
    Conj,
    /// Even length, mirrored about the gap between the two center taps.
    DoubleEven,
    DoubleOdd,
    DoubleConj,
}

impl FilterSymmetry {
    /// Logical filter length for `stored` stored taps.
    pub fn full_len(self, stored: usize) -> usize {
        match self {
            FilterSymmetry::General => stored,
            FilterSymmetry::Even | FilterSymmetry::Odd | FilterSymmetry::Conj => {
                (2 * stored).saturating_sub(1)
            }
            FilterSymmetry::DoubleEven | FilterSymmetry::DoubleOdd | FilterSymmetry::DoubleConj => 2 * stored,
        }
    }

    fn is_double(self) -> bool {
        matches!(
            self,
            FilterSymmetry::DoubleEven | FilterSymmetry::DoubleOdd | FilterSymmetry::DoubleConj
        )
    }
}

impl FromStr for FilterSymmetry {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "" | "general" => FilterSymmetry::General,
            "even" => FilterSymmetry::Even,
            "odd" => FilterSymmetry::Odd,
            "conj" => FilterSymmetry::Conj,
            "d-even" => FilterSymmetry::DoubleEven,
            "d-odd" => FilterSymmetry::DoubleOdd,
            "d-conj" => FilterSymmetry::DoubleConj,
            other => return Err(FrameError::InvalidFlag(format!("filter symmetry `{}`", other))),
        })
    }
}

impl fmt::Display for FilterSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterSymmetry::General => "general",
            FilterSymmetry::Even => "even",
            FilterSymmetry::Odd => "odd",
            FilterSymmetry::Conj => "conj",
            FilterSymmetry::DoubleEven => "d-even",
            FilterSymmetry::DoubleOdd => "d-odd",
            FilterSymmetry::DoubleConj => "d-conj",
        })
    }
}

/// Stored taps, real or complex.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTaps {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl FilterTaps {
    pub fn len(&self) -> usize {
        match self {
            FilterTaps::Real(v) => v.len(),
            FilterTaps::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_complex(&self) -> Vec<Complex64> {
        match self {
            FilterTaps::Real(v) => v.iter().map(|&x| Complex64::new(x, 0.0)).collect(),
            FilterTaps::Complex(v) => v.clone(),
        }
    }

    fn convert<T: Flex>(&self) -> Vec<T> {
        match self {
            FilterTaps::Real(v) => v.iter().map(|&x| T::from_f64(x)).collect(),
            FilterTaps::Complex(v) => v.iter().map(|&z| T::from_c64(z)).collect(),
        }
    }
}

/// A 1-D filter: stored taps, symmetry and origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OneDimensionalFilter {
    pub taps: FilterTaps,
    /// Index into the logical filter that lands on the output pixel;
    /// `None` means `L / 2`.
    pub origin: Option<usize>,
    pub symmetry: FilterSymmetry,
}

impl OneDimensionalFilter {
    /// General real filter.
    pub fn new(taps: Vec<f64>) -> Self {
        Self {
            taps: FilterTaps::Real(taps),
            origin: None,
            symmetry: FilterSymmetry::General,
        }
    }

    pub fn from_complex(taps: Vec<Complex64>) -> Self {
        Self {
            taps: FilterTaps::Complex(taps),
            origin: None,
            symmetry: FilterSymmetry::General,
        }
    }

    /// Complex filter from `(re, im)` pairs laid out one after the other.
    pub fn from_interleaved(values: &[f64]) -> Result<Self> {
        if values.len() % 2 != 0 {
            return Err(FrameError::InvalidFilter(format!(
                "interleaved complex taps need an even count, got {}",
                values.len()
            )));
        }
        let taps = values
            .chunks_exact(2)
            .map(|p| Complex64::new(p[0], p[1]))
            .collect();
        Ok(Self::from_complex(taps))
    }

    pub fn with_symmetry(mut self, symmetry: FilterSymmetry) -> Self {
        self.symmetry = symmetry;
        self
    }

    pub fn with_origin(mut self, origin: usize) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.taps, FilterTaps::Complex(_))
    }

    /// Symmetry actually used: the conjugate kinds are plain mirrors for
    /// real taps.
    pub fn effective_symmetry(&self) -> FilterSymmetry {
        match (self.symmetry, self.is_complex()) {
            (FilterSymmetry::Conj, false) => FilterSymmetry::Even,
            (FilterSymmetry::DoubleConj, false) => FilterSymmetry::DoubleEven,
            (s, _) => s,
        }
    }

    /// Length `L` of the logical filter.
    pub fn full_len(&self) -> usize {
        self.symmetry.full_len(self.taps.len())
    }

    /// The logical filter, with the mirrored half made explicit.
    pub fn full_taps(&self) -> FilterTaps {
        fn unfold<T: Copy>(stored: &[T], symmetry: FilterSymmetry, neg: impl Fn(T) -> T, conj: impl Fn(T) -> T) -> Vec<T> {
            let n = stored.len();
            let mirrored = match symmetry {
                FilterSymmetry::General => return stored.to_vec(),
                FilterSymmetry::Even | FilterSymmetry::Odd | FilterSymmetry::Conj => &stored[..n.saturating_sub(1)],
                _ => stored,
            };
            let mut full = stored.to_vec();
            full.extend(mirrored.iter().rev().map(|&v| match symmetry {
                FilterSymmetry::Odd | FilterSymmetry::DoubleOdd => neg(v),
                FilterSymmetry::Conj | FilterSymmetry::DoubleConj => conj(v),
                _ => v,
            }));
            full
        }
        match &self.taps {
            FilterTaps::Real(v) => FilterTaps::Real(unfold(v, self.symmetry, |x| -x, |x| x)),
            FilterTaps::Complex(v) => FilterTaps::Complex(unfold(v, self.symmetry, |z| -z, |z| z.conj())),
        }
    }

    /// Origin within the logical filter.
    pub fn origin(&self) -> Result<usize> {
        let len = self.full_len();
        match self.origin {
            None => Ok(len / 2),
            Some(o) if o < len => Ok(o),
            Some(o) => Err(FrameError::InvalidFilter(format!(
                "origin {} outside filter of length {}",
                o, len
            ))),
        }
    }

    /// Samples needed beyond each end of a line.
    pub fn border(&self) -> Result<usize> {
        let len = self.full_len();
        if len == 0 {
            return Ok(0);
        }
        let o = self.origin()?;
        Ok(o.max(len - 1 - o))
    }

    /// A filter that leaves its axis unchanged.
    pub fn is_identity(&self) -> bool {
        match self.full_len() {
            0 => true,
            1 => match &self.taps {
                FilterTaps::Real(v) => v[0] == 1.0,
                FilterTaps::Complex(v) => v[0] == Complex64::new(1.0, 0.0),
            },
            _ => false,
        }
    }

    /// Taps converted to `T` and rearranged for [`PreparedFilter::apply`];
    /// `None` for identity filters.
    pub(crate) fn prepare<T: Flex>(&self) -> Result<Option<PreparedFilter<T>>> {
        if self.is_identity() {
            return Ok(None);
        }
        let len = self.full_len();
        let lead = len - 1 - self.origin()?;
        let symmetry = self.effective_symmetry();
        let stored = self.taps.convert::<T>();
        let n = stored.len();
        let (taps, center) = match symmetry {
            FilterSymmetry::General => {
                let mut reversed = stored;
                reversed.reverse();
                (reversed, 0)
            }
            s => {
                let mut half = stored;
                half.reverse();
                (half, if s.is_double() { n } else { n - 1 })
            }
        };
        Ok(Some(PreparedFilter {
            symmetry,
            taps,
            lead,
            center,
        }))
    }
}

/// Filter in execution form.
///
/// For [`FilterSymmetry::General`], `taps` is the reversed logical filter;
/// otherwise it is the stored half reversed, so `taps[0]` is nearest to the
/// symmetry center.
#[derive(Debug, Clone)]
pub(crate) struct PreparedFilter<T> {
    symmetry: FilterSymmetry,
    taps: Vec<T>,
    /// `L - 1 - origin`: where the window starts relative to the output pixel.
    lead: usize,
    /// Offset of the symmetry center from the window start.
    center: usize,
}

impl<T: Flex> PreparedFilter<T> {
    /// Filter `buffer[border..border + length]`, whose `border` samples on
    /// each side have already been filled, into `out`.
    pub(crate) fn apply(&self, buffer: &[T], border: usize, length: usize, out: &mut OutLine<'_, T>) {
        let h = &self.taps;
        for i in 0..length {
            let start = i + border - self.lead;
            let b = start + self.center;
            let mut sum = T::zero();
            match self.symmetry {
                FilterSymmetry::General => {
                    for (k, &w) in h.iter().enumerate() {
                        sum += w * buffer[start + k];
                    }
                }
                FilterSymmetry::Even => {
                    sum = h[0] * buffer[b];
                    for m in 1..h.len() {
                        sum += h[m] * (buffer[b + m] + buffer[b - m]);
                    }
                }
                FilterSymmetry::Odd => {
                    sum = h[0] * buffer[b];
                    for m in 1..h.len() {
                        sum += h[m] * (buffer[b + m] - buffer[b - m]);
                    }
                }
                FilterSymmetry::Conj => {
                    sum = h[0] * buffer[b];
                    for m in 1..h.len() {
                        sum += h[m] * buffer[b + m] + h[m].conj() * buffer[b - m];
                    }
                }
                FilterSymmetry::DoubleEven => {
                    for (m, &w) in h.iter().enumerate() {
                        sum += w * (buffer[b + m] + buffer[b - 1 - m]);
                    }
                }
                FilterSymmetry::DoubleOdd => {
                    for (m, &w) in h.iter().enumerate() {
                        sum += w * (buffer[b + m] - buffer[b - 1 - m]);
                    }
                }
                FilterSymmetry::DoubleConj => {
                    for (m, &w) in h.iter().enumerate() {
                        sum += w * buffer[b + m] + w.conj() * buffer[b - 1 - m];
                    }
                }
            }
            out.set(i, sum);
        }
    }
}
