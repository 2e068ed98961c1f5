//! End-to-end tests against a running server.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use query_sanitizer::config::ServiceConfig;

mod common;

use common::{client, TestServer};

fn tenant_config(enabled: bool) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.permissions.enabled = enabled;
    let Value::Object(filter) = json!({"tenant_id": {"_eq": 5}}) else {
        unreachable!()
    };
    config.permissions.roles.insert("tenant_5".into(), filter);
    config
}

#[tokio::test]
async fn test_default_query() {
    let server = TestServer::start(ServiceConfig::default()).await;
    let res = client().get(server.url("/items")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"fields": ["*"]}));
}

#[tokio::test]
async fn test_full_query_normalized() {
    let server = TestServer::start(ServiceConfig::default()).await;
    let res = client()
        .get(server.url("/articles"))
        .query(&[
            ("fields", "id,title,author.name"),
            ("sort", "-published_on,title"),
            ("filter", r#"{"status":{"_eq":"published"}}"#),
            ("limit", "20"),
            ("offset", "40"),
            ("meta", "*"),
            ("search", "rust"),
            ("single", "0"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "fields": ["id", "title", "author.name"],
            "limit": 20,
            "sort": [
                {"column": "published_on", "order": "desc"},
                {"column": "title", "order": "asc"}
            ],
            "filter": {"status": {"_eq": "published"}},
            "offset": 40,
            "single": true,
            "meta": ["total_count", "filter_count"],
            "search": "rust"
        })
    );
}

#[tokio::test]
async fn test_degraded_values_pass_through() {
    let server = TestServer::start(ServiceConfig::default()).await;
    let res = client()
        .get(server.url("/items"))
        .query(&[("filter", "{bad json"), ("page", "two")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["filter"], json!("{bad json"));
    // NaN has no JSON form and is rendered as null.
    assert_eq!(body["page"], Value::Null);
    assert!(body.as_object().unwrap().contains_key("page"));
}

#[tokio::test]
async fn test_permission_filter_applied() {
    let server = TestServer::start(tenant_config(true)).await;
    let res = client()
        .get(server.url("/items?filter[tenant_id][_eq]=9&filter[status][_eq]=draft"))
        .header("x-role", "tenant_5")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["filter"],
        json!({"tenant_id": {"_eq": 5}, "status": {"_eq": "draft"}})
    );
}

#[tokio::test]
async fn test_unknown_role_rejected() {
    let server = TestServer::start(tenant_config(true)).await;
    let res = client()
        .get(server.url("/items"))
        .header("x-role", "nobody")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_permission_reload() {
    let server = TestServer::start(ServiceConfig::default()).await;

    let res = client()
        .get(server.url("/items"))
        .header("x-role", "tenant_5")
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body.get("filter").is_none());

    server.config_updates.send(tenant_config(true)).unwrap();

    let mut filter = Value::Null;
    for _ in 0..50 {
        let res = client()
            .get(server.url("/items"))
            .header("x-role", "tenant_5")
            .send()
            .await
            .unwrap();
        let body: Value = res.json().await.unwrap();
        if let Some(f) = body.get("filter") {
            filter = f.clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(filter, json!({"tenant_id": {"_eq": 5}}));
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(ServiceConfig::default()).await;
    let res = client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");
}
