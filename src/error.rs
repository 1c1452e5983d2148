//! Error types for the generation worker

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding requests or driving the pipelines
#[derive(Debug, Error)]
pub enum Error {
    /// Neither an image nor a text prompt was supplied
    #[error("No input image or text provided")]
    MissingInput,

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// A model pipeline stage failed
    #[error("{stage} failed: {message}")]
    Pipeline { stage: &'static str, message: String },

    /// The helper process hosting the models misbehaved
    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker is shutting down and no longer accepts requests
    #[error("Worker is shutting down")]
    Shutdown,
}

impl Error {
    pub fn pipeline(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage,
            message: message.into(),
        }
    }

    /// Whether the error was caused by the request rather than the worker
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MissingInput
                | Error::InvalidBase64(_)
                | Error::InvalidImage(_)
                | Error::InvalidMesh(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(Error::MissingInput.is_client_error());
        assert!(Error::InvalidMesh("bad magic".into()).is_client_error());
        assert!(!Error::pipeline("shape generation", "oom").is_client_error());
        assert!(!Error::Bridge("closed".into()).is_client_error());
        assert!(!Error::Shutdown.is_client_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::MissingInput.to_string(),
            "No input image or text provided"
        );
        assert_eq!(
            Error::pipeline("texture painting", "cuda error").to_string(),
            "texture painting failed: cuda error"
        );
    }
}
