//! Error Handling Module
//!
//! Defines the error type shared by the library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for brain tumor classifier operations
#[derive(Error, Debug)]
pub enum TumorError {
    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset discovery or splitting
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error building or running the model
    #[error("Model error: {0}")]
    Model(String),

    /// Error inside the training loop
    #[error("Training error: {0}")]
    Training(String),

    /// Error saving or restoring a checkpoint
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for library operations
pub type Result<T> = std::result::Result<T, TumorError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| TumorError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| TumorError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| TumorError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| TumorError::InvalidInput(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TumorError::Dataset("no class directories".to_string());
        assert_eq!(format!("{}", err), "Dataset error: no class directories");
    }

    #[test]
    fn test_image_load_error() {
        let path = PathBuf::from("/data/Healthy/scan_01.jpg");
        let err = TumorError::ImageLoad(path, "unsupported format".to_string());
        assert!(format!("{}", err).contains("scan_01.jpg"));
    }

    #[test]
    fn test_serde_error_converts() {
        let parsed: std::result::Result<u32, serde_json::Error> = serde_json::from_str("nope");
        let err: TumorError = parsed.unwrap_err().into();
        assert!(matches!(err, TumorError::Serialization(_)));
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<i32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let with_context = result.context("Failed to read weights");
        assert!(with_context.is_err());
        assert!(format!("{}", with_context.unwrap_err()).contains("Failed to read weights"));
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.with_context(|| "label 7 has no name".to_string());
        assert!(with_context.is_err());
    }
}
