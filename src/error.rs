use crate::search::retriever::Stage;

/// Failure taxonomy for the retrieval pipeline.
///
/// `InvalidArgument` and `IndexNotFound` are caller/configuration errors and
/// are never retried. `UpstreamUnavailable` is transient and eligible for
/// bounded retries; `UpstreamRejected` means the dependency answered but
/// declined, so retrying would not help. `RetrievalFailed` wraps an error
/// raised inside the retriever's searching/fusing stages.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: &'static str, reason: String },

    #[error("{service} rejected the request: {reason}")]
    UpstreamRejected { service: &'static str, reason: String },

    #[error("retrieval failed during {stage}: {source}")]
    RetrievalFailed {
        stage: Stage,
        #[source]
        source: Box<RetrievalError>,
    },
}

impl RetrievalError {
    pub fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }

    pub fn rejected(service: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            service,
            reason: reason.into(),
        }
    }

    /// Wrap this error as a stage failure of the retriever.
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::RetrievalFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// Whether a bounded retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    /// Classify a `reqwest` failure for the given service. Timeouts and
    /// connection problems are transient; everything else on the transport
    /// path is treated the same way, since no upstream verdict was received.
    pub fn from_transport(service: &'static str, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        Self::UpstreamUnavailable { service, reason }
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(RetrievalError::unavailable("embedding", "refused").is_transient());
        assert!(!RetrievalError::rejected("embedding", "bad input").is_transient());
        assert!(!RetrievalError::InvalidArgument("empty query".into()).is_transient());
        assert!(!RetrievalError::IndexNotFound("kb_legal".into()).is_transient());
    }

    #[test]
    fn test_stage_wrapping_keeps_cause() {
        let err = RetrievalError::IndexNotFound("kb_legal".into()).in_stage(Stage::Searching);
        let msg = err.to_string();
        assert!(msg.contains("searching"), "unexpected message: {msg}");
        match err {
            RetrievalError::RetrievalFailed { source, .. } => {
                assert!(matches!(*source, RetrievalError::IndexNotFound(_)));
            }
            other => panic!("expected RetrievalFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_wrapped_error_is_not_transient() {
        let err =
            RetrievalError::unavailable("document store", "down").in_stage(Stage::Searching);
        // The aggregate is surfaced after the per-call retry budget is spent;
        // it must not be retried again at an outer level.
        assert!(!err.is_transient());
    }
}
