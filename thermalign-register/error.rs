use std::fmt;

/// Errors from warping and compositing
#[derive(Debug, Clone, PartialEq)]
pub enum BlendError {
    /// The two layers do not have the same size
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// The transform has no inverse, so output pixels cannot be mapped back
    SingularTransform,
}

impl fmt::Display for BlendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendError::DimensionMismatch { expected, actual } => write!(
                f,
                "Layer size {}x{} does not match base image size {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            BlendError::SingularTransform => write!(f, "Transform is not invertible"),
        }
    }
}

impl std::error::Error for BlendError {}

pub type BlendResult<T> = Result<T, BlendError>;
