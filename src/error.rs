use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Malformed, truncated or unsupported codestream. Never retried.
    #[error("Codestream error: {0}")]
    CodestreamError(String),
    #[error("Invalid decomposition level {level} (codestream has {num_decompositions})")]
    InvalidLevel { level: u32, num_decompositions: u32 },
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("Invalid precinct configuration: {actual} precinct sizes for {expected} decompositions")]
    InvalidPrecinctConfiguration { expected: usize, actual: usize },
    #[error("Invalid precinct size {width}x{height}")]
    InvalidPrecinctSize { width: u32, height: u32 },

    // Argument errors
    #[error("Invalid argument width {0}")]
    InvalidArgumentWidth(u32),
    #[error("Invalid argument height {0}")]
    InvalidArgumentHeight(u32),
    #[error("Invalid argument bits per sample {0}")]
    InvalidArgumentBitsPerSample(u8),
    #[error("Invalid argument component count {0}")]
    InvalidArgumentComponentCount(usize),
    #[error("Invalid progression order {0}")]
    InvalidProgressionOrder(usize),
    #[error("Invalid block dimensions {width}x{height}")]
    InvalidBlockDimensions { width: u32, height: u32 },
    #[error("Invalid quantization step {0}")]
    InvalidQuantizationStep(f32),
    #[error("Invalid down-sampling factor {x}x{y} for component {component}")]
    InvalidDownSampling { component: usize, x: u32, y: u32 },
    #[error("Invalid number of decompositions {0}")]
    InvalidDecompositions(u32),
    #[error("Invalid image offset ({x}, {y})")]
    InvalidImageOffset { x: u32, y: u32 },
    #[error("Invalid tile offset ({x}, {y})")]
    InvalidTileOffset { x: u32, y: u32 },

    // Logic errors
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl CodecError {
    pub(crate) fn codestream(message: impl Into<String>) -> Self {
        Self::CodestreamError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
