//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout, metrics,
//!   permissions, query sanitation)
//! - Apply hot-reloaded permission tables
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Extension, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ServiceConfig, ValidationError};
use crate::http::middleware::{resolve_permissions, sanitize_query, track_requests};
use crate::http::request::UuidRequestId;
use crate::query::Query;
use crate::security::{PermissionStore, PermissionTable};

/// HTTP front end for the query sanitizer.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    permissions: Arc<PermissionStore>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self, ValidationError> {
        let table = PermissionTable::from_config(&config.permissions)?;
        let permissions = Arc::new(PermissionStore::new(table));
        let router = Self::build_router(&config, permissions.clone());
        Ok(Self {
            router,
            config,
            permissions,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, permissions: Arc<PermissionStore>) -> Router {
        // Layers wrap outward: permissions run before sanitation.
        let queries = Router::new()
            .route("/", get(echo_query))
            .route("/{*path}", get(echo_query))
            .layer(middleware::from_fn(sanitize_query))
            .layer(middleware::from_fn_with_state(permissions, resolve_permissions));

        Router::new()
            .route("/health", get(health))
            .merge(queries)
            .layer(middleware::from_fn(track_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn permissions(&self) -> Arc<PermissionStore> {
        self.permissions.clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// Configs received on `config_updates` replace the permission table.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let store = self.permissions.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_permissions(&store, &config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_permissions(store: &PermissionStore, config: &ServiceConfig) {
    match PermissionTable::from_config(&config.permissions) {
        Ok(table) => {
            tracing::info!(
                enabled = table.enabled(),
                roles = table.role_count(),
                "Permission table reloaded"
            );
            store.replace(table);
        }
        Err(e) => tracing::error!(error = %e, "Keeping previous permission table"),
    }
}

/// Stand-in for the downstream data service: returns the sanitized query.
async fn echo_query(Extension(query): Extension<Query>) -> Json<Query> {
    Json(query)
}

async fn health() -> &'static str {
    "ok"
}

/// Wait for shutdown signal (Ctrl+C).
pub async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server_with_roles(enabled: bool) -> HttpServer {
        let mut config = ServiceConfig::default();
        config.permissions.enabled = enabled;
        let Value::Object(filter) = json!({"tenant_id": {"_eq": 5}}) else {
            unreachable!()
        };
        config.permissions.roles.insert("tenant_5".into(), filter);
        HttpServer::new(config).unwrap()
    }

    async fn get(router: Router, uri: &str, role: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(role) = role {
            req = req.header("x-role", role);
        }
        let res = router.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_query_attached_to_request() {
        let router = server_with_roles(false).router();
        let (status, body) = get(router, "/items?fields=id,title&sort=-id&limit=-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "fields": ["id", "title"],
                "sort": [{"column": "id", "order": "desc"}]
            })
        );
    }

    #[tokio::test]
    async fn test_role_filter_merged() {
        let router = server_with_roles(true).router();
        let (status, body) = get(
            router,
            "/items?filter=%7B%22status%22%3A%7B%22_eq%22%3A%22published%22%7D%7D",
            Some("tenant_5"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["filter"],
            json!({"status": {"_eq": "published"}, "tenant_id": {"_eq": 5}})
        );
    }

    #[tokio::test]
    async fn test_unknown_role_forbidden() {
        let router = server_with_roles(true).router();
        let (status, _) = get(router, "/items", Some("intruder")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_role_ignored_when_disabled() {
        let router = server_with_roles(false).router();
        let (status, body) = get(router, "/items", Some("intruder")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("filter").is_none());
    }

    #[tokio::test]
    async fn test_request_id_echoed() {
        let router = server_with_roles(false).router();
        let res = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[test]
    fn test_reload_replaces_permissions() {
        let server = server_with_roles(true);
        let store = server.permissions();
        assert!(store.load().resolve("tenant_5").is_some());

        apply_permissions(&store, &ServiceConfig::default());
        assert!(!store.load().enabled());
        assert!(store.load().resolve("tenant_5").is_none());
    }
}
