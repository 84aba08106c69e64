use std::fmt;
use std::str::FromStr;

use crate::error::ConvolutionError;

/// How [`crate::convolution`] computes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConvolutionMethod {
    /// Weighted sum over the kernel's pixel table.
    Direct,
    /// Rank-1 decomposition into one 1-D filter per axis. Fails with
    /// [`ConvolutionError::NotSeparable`] when the kernel does not decompose.
    Separable,
    /// Product of transforms.
    Fourier,
    /// Pick by the [`crate::CostModel`].
    #[default]
    Best,
}

impl FromStr for ConvolutionMethod {
    type Err = ConvolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ConvolutionMethod::Direct),
            "separable" => Ok(ConvolutionMethod::Separable),
            "fourier" | "Fourier" => Ok(ConvolutionMethod::Fourier),
            "best" => Ok(ConvolutionMethod::Best),
            other => Err(ConvolutionError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for ConvolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConvolutionMethod::Direct => "direct",
            ConvolutionMethod::Separable => "separable",
            ConvolutionMethod::Fourier => "Fourier",
            ConvolutionMethod::Best => "best",
        })
    }
}
