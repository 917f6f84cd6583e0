use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("expected 5 keypoints, got {0}")]
    InvalidKeypointCount(usize),
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("crop sharpness {sharpness:.2} is below the minimum {minimum:.2}")]
    InsufficientSharpness { sharpness: f64, minimum: f64 },
}

impl From<image::ImageError> for MlError {
    fn from(value: image::ImageError) -> Self {
        MlError::Decode(value.to_string())
    }
}

impl From<std::io::Error> for MlError {
    fn from(value: std::io::Error) -> Self {
        MlError::Decode(value.to_string())
    }
}

impl From<serde_json::Error> for MlError {
    fn from(value: serde_json::Error) -> Self {
        MlError::Config(value.to_string())
    }
}
