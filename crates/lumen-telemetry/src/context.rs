//! Operation correlation for records emitted while a request is in flight.
//!
//! The request middleware scopes the request id as the operation id; every
//! record tracked inside that scope is stamped with it as `ai.operation.id`.

use std::future::Future;
use std::sync::Arc;

use tracing::Span;

tokio::task_local! {
    static OPERATION_ID: Arc<str>;
}

/// Fill the `request_id` and `route` fields of a request span.
pub fn record_request_span(span: &Span, operation_id: &str, route: &str) {
    span.record("request_id", operation_id);
    span.record("route", route);
}

/// Run `fut` with `operation_id` as the correlation id of its records.
///
/// Scopes nest; the innermost id wins.
pub async fn with_operation_id<Fut>(operation_id: impl Into<Arc<str>>, fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    OPERATION_ID.scope(operation_id.into(), fut).await
}

/// Operation id of the enclosing [`with_operation_id`] scope. Empty ids count
/// as absent.
#[must_use]
pub fn current_operation_id() -> Option<Arc<str>> {
    OPERATION_ID
        .try_with(Arc::clone)
        .ok()
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operation_id_is_visible_only_inside_its_scope() {
        assert!(current_operation_id().is_none());
        let seen = with_operation_id("req-42", async { current_operation_id() }).await;
        assert_eq!(seen.as_deref(), Some("req-42"));
        assert!(current_operation_id().is_none());
    }

    #[tokio::test]
    async fn inner_scope_wins_and_empty_ids_are_absent() {
        let (inner, empty) = with_operation_id("outer", async {
            let inner = with_operation_id("inner", async { current_operation_id() }).await;
            let empty = with_operation_id("", async { current_operation_id() }).await;
            (inner, empty)
        })
        .await;
        assert_eq!(inner.as_deref(), Some("inner"));
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_the_scope() -> anyhow::Result<()> {
        let leaked = with_operation_id("req-1", async {
            tokio::spawn(async { current_operation_id() }).await
        })
        .await?;
        assert!(leaked.is_none());
        Ok(())
    }
}
