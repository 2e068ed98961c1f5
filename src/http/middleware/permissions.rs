//! Permission resolution middleware.
//! Attaches the caller's permission filter before the query is sanitized.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::security::PermissionStore;

pub async fn resolve_permissions(
    State(store): State<Arc<PermissionStore>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let table = store.load();

    // Disabled: no permission context, queries pass through unrestricted.
    if !table.enabled() {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(table.role_header())
        .map(|value| value.to_str().map(str::to_string));
    let role = match header {
        Some(Ok(role)) => role,
        Some(Err(_)) => {
            return (StatusCode::BAD_REQUEST, "Invalid role header").into_response();
        }
        None => return next.run(req).await,
    };

    match table.resolve(&role) {
        Some(permissions) => {
            tracing::debug!(request_id = %req.request_id(), role = %role, "Permissions resolved");
            req.extensions_mut().insert(permissions);
            next.run(req).await
        }
        None => {
            tracing::warn!(request_id = %req.request_id(), role = %role, "Unknown role");
            (StatusCode::FORBIDDEN, "Unknown role").into_response()
        }
    }
}
