use thermalign_core::ParameterError;

#[derive(Debug, Clone)]
pub enum FastError {
    InvalidImageSize { width: usize, height: usize },
    InvalidImageData { expected_len: usize, actual_len: usize },
    ImageTooSmall { width: usize, height: usize, min_size: usize },
    InvalidConfig(ParameterError),
}

impl std::fmt::Display for FastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FastError::InvalidImageSize { width, height } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", width, height)
            }
            FastError::InvalidImageData { expected_len, actual_len } => {
                write!(f, "Image data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            FastError::ImageTooSmall { width, height, min_size } => {
                write!(f, "Image {}x{} too small (minimum {}x{})", width, height, min_size, min_size)
            }
            FastError::InvalidConfig(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FastError {}

impl From<ParameterError> for FastError {
    fn from(err: ParameterError) -> Self {
        FastError::InvalidConfig(err)
    }
}

pub type FastResult<T> = Result<T, FastError>;
