//! Per-request processing context.
//!
//! Components receive the context explicitly and log inside its span, so a
//! request's diagnostics carry its id without any process-wide state.

use tracing::{error, info_span, Span};
use uuid::Uuid;

use crate::error::MediaError;

/// Logging context for one blur request.
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    request_id: String,
    span: Span,
}

impl ProcessingContext {
    /// Create a context with its own `blur_job` span.
    pub fn new(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let span = info_span!("blur_job", request_id = %request_id);
        Self { request_id, span }
    }

    /// Create a context with a fresh random request id.
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Context whose span is disabled; diagnostics still reach the active subscriber.
    pub fn detached() -> Self {
        Self {
            request_id: "detached".to_string(),
            span: Span::none(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Log an error with its operation name and hand it back for propagation.
    pub fn fail(&self, err: MediaError) -> MediaError {
        let _guard = self.span.enter();
        match &err {
            MediaError::Acquisition {
                status: Some(status),
                ..
            } => error!(
                operation = err.operation(),
                status = *status,
                error = %err,
                "Operation failed"
            ),
            _ => error!(operation = err.operation(), error = %err, "Operation failed"),
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_kept() {
        let ctx = ProcessingContext::new("req-42");
        assert_eq!(ctx.request_id(), "req-42");
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(
            ProcessingContext::generate().request_id(),
            ProcessingContext::generate().request_id()
        );
    }

    #[test]
    fn test_fail_returns_same_error() {
        let ctx = ProcessingContext::detached();
        let err = ctx.fail(MediaError::EmptyEncode);
        assert!(matches!(err, MediaError::EmptyEncode));
    }
}
