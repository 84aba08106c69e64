use pixframe_view::FrameError;

/// Errors raised by the convolution dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ConvolutionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("kernel is not separable")]
    NotSeparable,

    #[error("unknown convolution method `{0}`")]
    UnknownMethod(String),
}

/// Convenience alias for `Result<T, ConvolutionError>`.
pub type Result<T> = std::result::Result<T, ConvolutionError>;
