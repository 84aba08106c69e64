//! Neighborhood kernels compiled into runs of pixels.
//!
//! A [`PixelTable`] lists the pixels of an arbitrarily shaped kernel as runs
//! along one processing dimension, with coordinates relative to the kernel
//! origin, plus a flat weight list in run order. [`PixelTable::offsets`]
//! turns the coordinates into sample offsets for one particular image.

use num_complex::Complex64;
use pixframe_view::{CoordIter, DataType, Flex, FrameError, Image};

use crate::Result;

// ============================================================================
// Kernel
// ============================================================================

/// A scalar kernel image with its interpretation flags.
///
/// The origin is at `size / 2` along every dimension. Binary kernels define
/// a footprint without weights.
#[derive(Debug)]
pub struct Kernel {
    image: Image,
    mirrored: bool,
    ignore_zeros: bool,
}

impl Clone for Kernel {
    fn clone(&self) -> Self {
        Self {
            image: self.image.quick_copy(),
            mirrored: self.mirrored,
            ignore_zeros: self.ignore_zeros,
        }
    }
}

impl Kernel {
    pub fn new(image: Image) -> Result<Self> {
        if !image.is_forged() {
            return Err(FrameError::NotForged);
        }
        if !image.is_scalar() {
            return Err(FrameError::TensorMismatch(1, image.tensor_elements()));
        }
        Ok(Self {
            image,
            mirrored: false,
            ignore_zeros: true,
        })
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn sizes(&self) -> &[usize] {
        self.image.sizes()
    }

    pub fn dimensionality(&self) -> usize {
        self.image.dimensionality()
    }

    /// Toggle mirroring (point reflection about the origin).
    pub fn mirror(&mut self) {
        self.mirrored = !self.mirrored;
    }

    pub fn mirrored(mut self) -> Self {
        self.mirror();
        self
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Keep zero-weight pixels in the table.
    pub fn keep_zeros(mut self) -> Self {
        self.ignore_zeros = false;
        self
    }

    pub fn ignores_zeros(&self) -> bool {
        self.ignore_zeros
    }

    pub fn is_binary(&self) -> bool {
        self.image.data_type() == DataType::Bin
    }

    pub fn has_complex_weights(&self) -> bool {
        self.image.data_type().is_complex()
    }

    /// Compile the kernel for an image of `ndims` dimensions, with runs
    /// along `proc_dim`.
    pub fn pixel_table(&self, ndims: usize, proc_dim: usize) -> Result<PixelTable> {
        let kdims = self.dimensionality();
        if kdims > ndims {
            return Err(FrameError::DimensionalityMismatch {
                expected: ndims,
                found: kdims,
            });
        }
        if proc_dim >= ndims.max(1) {
            return Err(FrameError::InvalidAxis {
                axis: proc_dim,
                rank: ndims,
            });
        }
        let mut sizes = self.sizes().to_vec();
        sizes.resize(ndims.max(1), 1);
        let origin: Vec<isize> = sizes.iter().map(|&s| (s / 2) as isize).collect();

        enum Values {
            Binary,
            Real(Vec<f64>),
            Complex(Vec<Complex64>),
        }
        let mut values = match self.image.data_type() {
            DataType::Bin => Values::Binary,
            dt if dt.is_complex() => Values::Complex(Vec::new()),
            _ => Values::Real(Vec::new()),
        };

        let mut line_sizes = sizes.clone();
        line_sizes[proc_dim] = 1;
        let kernel_coords = |c: &[usize]| c[..kdims].to_vec();
        let mut runs = Vec::new();
        for start in CoordIter::new(&line_sizes) {
            let mut coords = start.clone();
            let mut run: Option<PixelRun> = None;
            for x in 0..sizes[proc_dim] {
                coords[proc_dim] = x;
                let kc = kernel_coords(&coords);
                let keep = match &mut values {
                    Values::Binary => self.image.sample::<bool>(&kc)?,
                    Values::Real(w) => {
                        let v = self.image.sample::<f64>(&kc)?;
                        let keep = !self.ignore_zeros || v != 0.0;
                        if keep {
                            w.push(v);
                        }
                        keep
                    }
                    Values::Complex(w) => {
                        let v = self.image.sample::<Complex64>(&kc)?;
                        let keep = !self.ignore_zeros || v != Complex64::new(0.0, 0.0);
                        if keep {
                            w.push(v);
                        }
                        keep
                    }
                };
                if !keep {
                    runs.extend(run.take());
                    continue;
                }
                match run.as_mut() {
                    Some(r) => r.length += 1,
                    None => {
                        run = Some(PixelRun {
                            coordinates: coords
                                .iter()
                                .zip(&origin)
                                .map(|(&c, &o)| c as isize - o)
                                .collect(),
                            length: 1,
                        })
                    }
                }
            }
            runs.extend(run);
        }
        let weights = match values {
            Values::Binary => PixelWeights::None,
            Values::Real(w) => PixelWeights::Real(w),
            Values::Complex(w) => PixelWeights::Complex(w),
        };
        let mut table = PixelTable {
            sizes,
            origin,
            runs,
            weights,
            proc_dim,
        };
        if self.mirrored {
            table.mirror();
        }
        Ok(table)
    }
}

// ============================================================================
// PixelTable
// ============================================================================

/// A run of consecutive kernel pixels along the processing dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelRun {
    /// Coordinates of the first pixel relative to the kernel origin.
    pub coordinates: Vec<isize>,
    pub length: usize,
}

/// Weights of the table pixels, in run order.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelWeights {
    /// Binary footprint.
    None,
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl PixelWeights {
    pub fn is_complex(&self) -> bool {
        matches!(self, PixelWeights::Complex(_))
    }

    fn reverse(&mut self) {
        match self {
            PixelWeights::None => {}
            PixelWeights::Real(w) => w.reverse(),
            PixelWeights::Complex(w) => w.reverse(),
        }
    }

    /// Weights as `T`; ones for a binary footprint of `n` pixels.
    pub fn to_flex<T: Flex>(&self, n: usize) -> Vec<T> {
        match self {
            PixelWeights::None => vec![T::one(); n],
            PixelWeights::Real(w) => w.iter().map(|&v| T::from_f64(v)).collect(),
            PixelWeights::Complex(w) => w.iter().map(|&v| T::from_c64(v)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelTable {
    sizes: Vec<usize>,
    origin: Vec<isize>,
    runs: Vec<PixelRun>,
    weights: PixelWeights,
    proc_dim: usize,
}

impl PixelTable {
    /// Bounding box of the kernel.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Origin within the bounding box.
    pub fn origin(&self) -> &[isize] {
        &self.origin
    }

    pub fn runs(&self) -> &[PixelRun] {
        &self.runs
    }

    pub fn weights(&self) -> &PixelWeights {
        &self.weights
    }

    pub fn processing_dim(&self) -> usize {
        self.proc_dim
    }

    pub fn number_of_pixels(&self) -> usize {
        self.runs.iter().map(|r| r.length).sum()
    }

    /// Point-reflect the table about the origin.
    pub fn mirror(&mut self) {
        let p = self.proc_dim;
        for run in self.runs.iter_mut() {
            let last = run.coordinates[p] + run.length as isize - 1;
            for c in run.coordinates.iter_mut() {
                *c = -*c;
            }
            run.coordinates[p] = -last;
        }
        self.runs.reverse();
        self.weights.reverse();
        for (o, &s) in self.origin.iter_mut().zip(&self.sizes) {
            *o = s as isize - 1 - *o;
        }
    }

    /// How far the table reaches before and after the origin, per dimension.
    pub fn reach(&self) -> (Vec<usize>, Vec<usize>) {
        let n = self.sizes.len();
        let (mut before, mut after) = (vec![0usize; n], vec![0usize; n]);
        for run in &self.runs {
            for d in 0..n {
                let lo = run.coordinates[d];
                let hi = if d == self.proc_dim {
                    lo + run.length as isize - 1
                } else {
                    lo
                };
                before[d] = before[d].max((-lo).max(0) as usize);
                after[d] = after[d].max(hi.max(0) as usize);
            }
        }
        (before, after)
    }

    /// Sample offsets of every pixel for an image with the given strides.
    pub fn offsets(&self, strides: &[isize]) -> PixelTableOffsets {
        let stride = strides[self.proc_dim];
        let mut offsets = Vec::with_capacity(self.number_of_pixels());
        let mut runs = Vec::with_capacity(self.runs.len());
        for run in &self.runs {
            let start: isize = run.coordinates.iter().zip(strides).map(|(&c, &s)| c * s).sum();
            runs.push((start, run.length));
            offsets.extend((0..run.length as isize).map(|k| start + k * stride));
        }
        PixelTableOffsets {
            offsets,
            runs,
            weights: self.weights.clone(),
            stride,
        }
    }
}

/// A [`PixelTable`] compiled against one image's strides.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTableOffsets {
    /// Offset of every pixel relative to the output pixel.
    pub offsets: Vec<isize>,
    /// Offset of the first pixel and length of every run.
    pub runs: Vec<(isize, usize)>,
    pub weights: PixelWeights,
    /// Stride along the processing dimension.
    pub stride: isize,
}

impl PixelTableOffsets {
    pub fn number_of_pixels(&self) -> usize {
        self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel_3x3() -> Kernel {
        // 1 2 0
        // 0 5 0
        // 7 0 9     (first index runs along x)
        let values = vec![1.0f64, 2.0, 0.0, 0.0, 5.0, 0.0, 7.0, 0.0, 9.0];
        Kernel::new(Image::from_vec(&[3, 3], values).unwrap()).unwrap()
    }

    #[test]
    fn test_runs_and_weights() {
        let table = kernel_3x3().pixel_table(2, 0).unwrap();
        assert_eq!(table.origin(), &[1, 1]);
        assert_eq!(table.number_of_pixels(), 5);
        assert_eq!(
            table.runs(),
            &[
                PixelRun { coordinates: vec![-1, -1], length: 2 },
                PixelRun { coordinates: vec![0, 0], length: 1 },
                PixelRun { coordinates: vec![-1, 1], length: 1 },
                PixelRun { coordinates: vec![1, 1], length: 1 },
            ]
        );
        assert_eq!(table.weights(), &PixelWeights::Real(vec![1.0, 2.0, 5.0, 7.0, 9.0]));
    }

    #[test]
    fn test_keep_zeros() {
        let table = kernel_3x3().keep_zeros().pixel_table(2, 1).unwrap();
        assert_eq!(table.number_of_pixels(), 9);
        assert_eq!(table.runs().len(), 3);
        assert!(table.runs().iter().all(|r| r.length == 3));
    }

    #[test]
    fn test_mirror_is_involution() {
        let original = kernel_3x3().pixel_table(2, 0).unwrap();
        let mut table = original.clone();
        table.mirror();
        assert_ne!(table, original);
        assert_eq!(table.runs()[0], PixelRun { coordinates: vec![-1, -1], length: 1 });
        assert_eq!(table.weights(), &PixelWeights::Real(vec![9.0, 7.0, 5.0, 2.0, 1.0]));
        table.mirror();
        assert_eq!(table, original);
    }

    #[test]
    fn test_mirrored_kernel_reflects_weights() {
        let table = kernel_3x3().mirrored().pixel_table(2, 0).unwrap();
        let plain = kernel_3x3().pixel_table(2, 0).unwrap();
        let offsets = table.offsets(&[1, 10]);
        let plain_offsets = plain.offsets(&[1, 10]);
        let lookup = |o: &PixelTableOffsets, off: isize| {
            let k = o.offsets.iter().position(|&x| x == off).unwrap();
            match &o.weights {
                PixelWeights::Real(w) => w[k],
                _ => unreachable!(),
            }
        };
        for &off in &plain_offsets.offsets {
            assert_eq!(lookup(&offsets, -off), lookup(&plain_offsets, off));
        }
    }

    #[test]
    fn test_offsets_and_reach() {
        let table = kernel_3x3().pixel_table(3, 0).unwrap();
        let offsets = table.offsets(&[1, 8, 64]);
        assert_eq!(offsets.offsets, vec![-9, -8, 0, 7, 9]);
        assert_eq!(offsets.runs[0], (-9, 2));
        assert_eq!(offsets.stride, 1);
        assert_eq!(table.reach(), (vec![1, 1, 0], vec![1, 1, 0]));
    }

    #[test]
    fn test_binary_kernel_and_errors() {
        let disk = Image::from_vec(&[3], vec![true, false, true]).unwrap();
        let kernel = Kernel::new(disk).unwrap();
        assert!(kernel.is_binary());
        let table = kernel.pixel_table(2, 0).unwrap();
        assert_eq!(table.weights(), &PixelWeights::None);
        assert_eq!(table.number_of_pixels(), 2);
        assert!(matches!(
            kernel.pixel_table(0, 0),
            Err(FrameError::DimensionalityMismatch { .. })
        ));
        assert!(Kernel::new(Image::default()).is_err());
    }
}
