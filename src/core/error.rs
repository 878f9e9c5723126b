//! Error types for voxmap

use thiserror::Error;

/// Main error type for the map and its triangulation pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Triangulation kernel unavailable: {0}")]
    KernelUnavailable(String),

    #[error("Kernel produced {count} triangles but only {capacity} fit the output buffer")]
    BufferCapacityExceeded { count: u32, capacity: u32 },

    #[error("Triangle readback returned {actual} records, expected {expected}")]
    ReadbackMismatch { expected: usize, actual: usize },

    #[error("Buffers sized for voxel resolution {expected} used with resolution {actual}")]
    ResolutionMismatch { expected: u32, actual: u32 },

    #[error("Invalid map configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether re-issuing the failed call after reallocating buffers may succeed.
    ///
    /// Kernel and buffer conditions are transient; a resolution mismatch or a
    /// bad configuration is a programming error and never resolves itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::KernelUnavailable(_)
                | Error::BufferCapacityExceeded { .. }
                | Error::ReadbackMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::KernelUnavailable("no adapter".into()).is_retryable());
        assert!(Error::BufferCapacityExceeded { count: 10, capacity: 4 }.is_retryable());
        assert!(Error::ReadbackMismatch { expected: 3, actual: 2 }.is_retryable());

        assert!(!Error::ResolutionMismatch { expected: 8, actual: 4 }.is_retryable());
        assert!(!Error::InvalidConfig("chunk_size".into()).is_retryable());
        assert!(!Error::Gpu("lost".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::BufferCapacityExceeded { count: 30, capacity: 27 };
        assert_eq!(
            err.to_string(),
            "Kernel produced 30 triangles but only 27 fit the output buffer"
        );
    }
}
