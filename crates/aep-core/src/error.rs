//! Unified error type for the AEP toolkit
//!
//! [`AepError`] separates the three failure classes of an analysis run:
//! configuration problems caught at construction, missing calendar coverage
//! caught while deriving the long-term loss baseline, and numerical failures
//! raised while fitting a regression. All of them abort the run.
//!
//! # Example
//!
//! ```ignore
//! use aep_core::{AepError, AepResult};
//!
//! fn check_sim_count(num_sim: usize) -> AepResult<()> {
//!     if num_sim == 0 {
//!         return Err(AepError::Config("num_sim must be >= 1".into()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all AEP operations.
#[derive(Error, Debug)]
pub enum AepError {
    /// Invalid construction or run input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operating history does not cover a full calendar cycle
    #[error("Coverage error: {0}")]
    Coverage(String),

    /// Malformed or missing plant data
    #[error("Data error: {0}")]
    Data(String),

    /// Degenerate or failed regression fit
    #[error("Regression error: {0}")]
    Regression(String),

    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl AepError {
    /// True for errors raised while validating configuration or run inputs.
    pub fn is_config(&self) -> bool {
        matches!(self, AepError::Config(_))
    }

    /// True for missing calendar coverage in the loss history.
    pub fn is_coverage(&self) -> bool {
        matches!(self, AepError::Coverage(_))
    }
}

/// Convenience type alias for Results using AepError.
pub type AepResult<T> = Result<T, AepError>;

impl From<anyhow::Error> for AepError {
    fn from(err: anyhow::Error) -> Self {
        AepError::Other(format!("{err:#}"))
    }
}

impl From<String> for AepError {
    fn from(s: String) -> Self {
        AepError::Other(s)
    }
}

impl From<&str> for AepError {
    fn from(s: &str) -> Self {
        AepError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AepError::Coverage("only 11 calendar months".into());
        assert!(err.to_string().contains("Coverage error"));
        assert!(err.to_string().contains("11 calendar months"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AepError = io_err.into();
        assert!(matches!(err, AepError::Io(_)));
    }

    #[test]
    fn test_classifiers() {
        assert!(AepError::Config("x".into()).is_config());
        assert!(!AepError::Config("x".into()).is_coverage());
        assert!(AepError::Coverage("x".into()).is_coverage());
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> AepResult<()> {
            Err(AepError::Regression("singular".into()))
        }

        fn outer() -> AepResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(AepError::Regression(_))));
    }
}
