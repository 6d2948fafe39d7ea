//! Test error types.

/// Result type alias for test operations.
pub type Result<T> = std::result::Result<T, TestError>;

/// Testing errors.
///
/// Supervisor failures are not test errors; they are part of the
/// [`ScenarioReport`](crate::ScenarioReport).
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Harness error.
    #[error("harness error: {0}")]
    Harness(String),

    /// Timeout.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
}

impl TestError {
    /// Creates a harness error.
    #[must_use]
    pub fn harness(msg: impl Into<String>) -> Self {
        Self::Harness(msg.into())
    }
}
