//! Per-request correlation IDs.

use std::future::Future;
use uuid::Uuid;

/// Header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request ID that is honored.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Per-request context with correlation ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Creates a new request context with a generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Reuses a caller-supplied ID when it is short and printable ASCII,
    /// otherwise generates one.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .map(str::trim)
            .filter(|id| {
                !id.is_empty()
                    && id.len() <= MAX_REQUEST_ID_LEN
                    && id.bytes().all(|b| b.is_ascii_graphic())
            })
            .map_or_else(Self::new, |id| Self {
                request_id: id.to_string(),
            })
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

tokio::task_local! {
    static TASK_CONTEXT: RequestContext;
}

/// Scopes a request context across an async future.
pub async fn scope_request_context<F, T>(context: RequestContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    TASK_CONTEXT.scope(context, fut).await
}

/// Returns the current request ID, if set.
#[must_use]
pub fn current_request_id() -> Option<String> {
    TASK_CONTEXT.try_with(|ctx| ctx.request_id.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RequestContext::new(), RequestContext::new());
    }

    #[test]
    fn test_from_header_reuses_valid_id() {
        let context = RequestContext::from_header(Some(" req-42 "));
        assert_eq!(context.request_id(), "req-42");
    }

    #[test]
    fn test_from_header_rejects_invalid_id() {
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        for value in [None, Some(""), Some("has space"), Some("tab\tid"), Some(long.as_str())] {
            let context = RequestContext::from_header(value);
            assert!(Uuid::parse_str(context.request_id()).is_ok());
        }
    }

    #[tokio::test]
    async fn test_scope_request_context_propagates_across_await() {
        let context = RequestContext::from_header(Some("async-test"));
        let observed = scope_request_context(context, async {
            tokio::task::yield_now().await;
            current_request_id()
        })
        .await;

        assert_eq!(observed.as_deref(), Some("async-test"));
        assert!(current_request_id().is_none());
    }
}
