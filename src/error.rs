use thiserror::Error;

/// Main error type for Friendgraph
#[derive(Error, Debug)]
pub enum FriendgraphError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted collection or export could not be encoded/decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (e.g. a collection with duplicate identifiers)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Analysis pass errors
    #[error("Analysis error: {0}")]
    Analysis(String),
}

/// Convenient Result type using FriendgraphError
pub type Result<T> = std::result::Result<T, FriendgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FriendgraphError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<Vec<u32>>("not json").unwrap_err();
        let err: FriendgraphError = json_err.into();
        assert!(matches!(err, FriendgraphError::Json(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FriendgraphError = io_err.into();
        assert!(matches!(err, FriendgraphError::Io(_)));
    }
}
