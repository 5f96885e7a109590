/// Error types for ranking-service
///
/// Only invalid input, total recall failure and an elapsed request deadline
/// reach the caller. Single-source recall failures and uncomputable features
/// are recovered inside the pipeline and only logged.
use std::time::Duration;
use thiserror::Error;
use tonic::Status;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed limit or user id; rejected before any work
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Every recall source failed
    #[error("All recall sources are unavailable")]
    UpstreamUnavailable,

    /// The request deadline elapsed; in-flight recall was aborted
    #[error("Request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl From<PipelineError> for Status {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidArgument(msg) => Status::invalid_argument(msg),
            PipelineError::UpstreamUnavailable => Status::unavailable(err.to_string()),
            PipelineError::DeadlineExceeded(_) => Status::deadline_exceeded(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_mapping() {
        let status: Status = PipelineError::InvalidArgument("limit must be positive".into()).into();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "limit must be positive");

        let status: Status = PipelineError::UpstreamUnavailable.into();
        assert_eq!(status.code(), Code::Unavailable);

        let status: Status = PipelineError::DeadlineExceeded(Duration::from_millis(10)).into();
        assert_eq!(status.code(), Code::DeadlineExceeded);
    }
}
