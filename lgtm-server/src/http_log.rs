//! Outbound request logging and correlation-id propagation.
//!
//! Every webhook delivery gets a correlation id. The task that handles it runs
//! inside [`with_correlation_id`], and the middleware below stamps that id on
//! each GitHub request as `X-Correlation-ID` and logs the call.

use std::future::Future;
use std::time::Instant;

use axum::http::{self, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use tracing::{debug, warn};
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

tokio::task_local! {
    static CURRENT_CORRELATION_ID: CorrelationId;
}

/// Run `fut` with `id` as the correlation id of every request it makes.
pub async fn with_correlation_id<F: Future>(id: CorrelationId, fut: F) -> F::Output {
    CURRENT_CORRELATION_ID.scope(id, fut).await
}

pub fn current_correlation_id() -> Option<CorrelationId> {
    CURRENT_CORRELATION_ID.try_with(|id| id.clone()).ok()
}

pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            let correlation_id = extensions
                .get::<CorrelationId>()
                .cloned()
                .or_else(current_correlation_id)
                .unwrap_or_else(CorrelationId::generate);
            if let Ok(value) = HeaderValue::from_str(&correlation_id.0) {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let method = req.method().clone();
        let path = req.url().path().to_string();
        let started = Instant::now();

        let response = next.run(req, extensions).await;

        match &response {
            Ok(resp) => debug!(
                "GitHub {} {} -> {} ({} ms)",
                method,
                path,
                resp.status(),
                started.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "GitHub {} {} failed after {} ms: {}",
                method,
                path,
                started.elapsed().as_millis(),
                err
            ),
        }

        response
    }
}
