//! Error types shared by the Reprise crates.

use thiserror::Error;

/// Main error type for Reprise
#[derive(Error, Debug)]
pub enum RpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("Statistics error: {0}")]
    Statistics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by a single optimizer invocation.
///
/// These never abort a run: the retry loop logs them and moves on.
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Optimizer {optimizer} failed: {message}")]
    Failed { optimizer: String, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Optimizer panicked: {message}")]
    Panicked { message: String },
}

/// Result type alias for Reprise operations
pub type RpResult<T> = Result<T, RpError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::RpError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::RpError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = OptimizerError::DimensionMismatch {
            expected: 3,
            actual: 2,
        };

        assert!(error.to_string().contains("Dimension mismatch"));
        assert!(error.to_string().contains('3'));
        assert!(error.to_string().contains('2'));
    }

    #[test]
    fn test_error_conversion() {
        let optimizer_error = OptimizerError::Failed {
            optimizer: "de".to_string(),
            message: "population collapsed".to_string(),
        };
        let rp_error: RpError = optimizer_error.into();

        match rp_error {
            RpError::Optimizer(_) => (),
            _ => panic!("Expected Optimizer error"),
        }
    }

    #[test]
    fn test_macros() {
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, RpError::Internal(_)));
        let config_err = config_error!("Missing required field: {}", "bounds");
        assert_eq!(
            config_err.to_string(),
            "Configuration error: Missing required field: bounds"
        );
    }
}
