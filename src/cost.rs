//! Analytic time model used to choose a convolution method.
//!
//! The coefficients were fitted on one reference machine. They express
//! relative cost only; replace them through [`crate::ConvolutionOptions`]
//! when tuning for other hardware.

/// Coefficient table of the method-selection model.
///
/// With `n` the number of samples, `ks` the sum of the kernel sizes, `kp`
/// their product and `nx` the product of image plus kernel sizes:
///
/// - Fourier: `fourier_per_sample * nx + fourier_fixed`
/// - separable: `separable_per_sample * n * ks + separable_per_tap * ks`
/// - direct: `direct_per_sample * n * kp + direct_per_pixel * kp`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub fourier_per_sample: f64,
    pub fourier_fixed: f64,
    pub separable_per_sample: f64,
    pub separable_per_tap: f64,
    pub direct_per_sample: f64,
    pub direct_per_pixel: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fourier_per_sample: 1.635e-8,
            fourier_fixed: 8.781e-4,
            separable_per_sample: 1.434e-10,
            separable_per_tap: 4.987e-6,
            direct_per_sample: 1.806e-10,
            direct_per_pixel: 1.206e-5,
        }
    }
}

/// The three estimates for one image/kernel pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEstimate {
    pub fourier: f64,
    pub separable: f64,
    pub direct: f64,
}

impl CostEstimate {
    /// Whether a rank-1 decomposition is worth attempting.
    pub fn try_separable(&self) -> bool {
        self.separable < self.fourier
    }

    /// Whether the Fourier route beats the direct one; exactly one of the
    /// two is used when the kernel does not decompose.
    pub fn try_fourier(&self) -> bool {
        self.fourier < self.direct
    }
}

impl CostModel {
    /// `image_sizes` and `kernel_sizes` must have the same length.
    pub fn fourier(&self, image_sizes: &[usize], kernel_sizes: &[usize]) -> f64 {
        let nx: f64 = image_sizes
            .iter()
            .zip(kernel_sizes)
            .map(|(&i, &k)| (i + k) as f64)
            .product();
        self.fourier_per_sample * nx + self.fourier_fixed
    }

    pub fn separable(&self, samples: usize, kernel_sizes: &[usize]) -> f64 {
        let ks = kernel_sizes.iter().sum::<usize>() as f64;
        self.separable_per_sample * samples as f64 * ks + self.separable_per_tap * ks
    }

    pub fn direct(&self, samples: usize, kernel_sizes: &[usize]) -> f64 {
        let kp: f64 = kernel_sizes.iter().map(|&k| k as f64).product();
        self.direct_per_sample * samples as f64 * kp + self.direct_per_pixel * kp
    }

    pub fn estimate(&self, image_sizes: &[usize], samples: usize, kernel_sizes: &[usize]) -> CostEstimate {
        CostEstimate {
            fourier: self.fourier(image_sizes, kernel_sizes),
            separable: self.separable(samples, kernel_sizes),
            direct: self.direct(samples, kernel_sizes),
        }
    }
}
