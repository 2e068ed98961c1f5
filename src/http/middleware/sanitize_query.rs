//! Query sanitation middleware.
//!
//! Normalizes the request's query string into a [`Query`] and stores it in
//! the request extensions for the handlers behind it.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::http::request::RequestIdExt;
use crate::observability::metrics;
use crate::query::{sanitize_with_report, Query, RawInput, Sanitized};
use crate::security::Permissions;

pub async fn sanitize_query(mut req: Request<Body>, next: Next) -> Response {
    let raw = RawInput::from_query_str(req.uri().query().unwrap_or_default());
    let Sanitized { query, degraded } =
        sanitize_with_report(&raw, req.extensions().get::<Permissions>());

    for degradation in &degraded {
        metrics::record_degraded(degradation.field);
    }
    tracing::debug!(
        request_id = %req.request_id(),
        fields = ?query.fields,
        degraded = degraded.len(),
        "Query sanitized"
    );

    req.extensions_mut().insert::<Query>(query);
    next.run(req).await
}
