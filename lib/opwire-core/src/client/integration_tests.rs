//! End-to-end calls against a local axum server.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use rstest::rstest;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use super::{ApiClient, CallError, ErrorRecord, Input, ResponseSource};
use crate::spec::Specification;

fn init_tracing() {
    // several tests may install it, only the first succeeds
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

const PETSTORE: &str = r#"{
    "swagger": "2.0",
    "basePath": "/api/",
    "paths": {
        "/pets": {
            "get": {
                "operationId": "listPets",
                "parameters": [
                    { "name": "limit", "in": "query", "default": 10 },
                    { "name": "tag", "in": "query" }
                ]
            },
            "post": {
                "operationId": "addPet",
                "parameters": [
                    { "name": "X-Request-Id", "in": "header" },
                    { "name": "pet", "in": "body", "required": true }
                ]
            }
        },
        "/pets/{petId}": {
            "parameters": [{ "name": "petId", "in": "path", "required": true }],
            "get": { "operationId": "showPetById" }
        },
        "/login": {
            "post": {
                "operationId": "login",
                "parameters": [
                    { "name": "user", "in": "formData", "required": true },
                    { "name": "password", "in": "formData", "required": true }
                ]
            }
        },
        "/files/{name}": {
            "put": {
                "parameters": [
                    { "name": "name", "in": "path", "required": true },
                    { "name": "content", "in": "file", "required": true }
                ]
            }
        },
        "/status/{code}": {
            "get": {
                "operationId": "status",
                "parameters": [{ "name": "code", "in": "path", "required": true }]
            }
        }
    }
}"#;

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

async fn list_pets(State(hits): State<Hits>, Query(query): Query<BTreeMap<String, String>>) -> Json<Value> {
    hits.hit();
    Json(json!({ "hit": hits.count(), "query": query }))
}

async fn add_pet(State(hits): State<Hits>, headers: HeaderMap, body: String) -> Json<Value> {
    hits.hit();
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|it| it.to_str().ok())
            .map(ToString::to_string)
    };
    Json(json!({
        "contentType": header_value("content-type"),
        "requestId": header_value("x-request-id"),
        "body": serde_json::from_str::<Value>(&body).unwrap_or(Value::Null),
    }))
}

async fn show_pet(State(hits): State<Hits>, Path(pet_id): Path<String>) -> impl IntoResponse {
    hits.hit();
    if pet_id == "0" {
        let errors = json!({ "errors": [{ "message": "Pet not found", "path": "/petId" }] });
        return (StatusCode::NOT_FOUND, Json(errors)).into_response();
    }
    Json(json!({ "id": pet_id })).into_response()
}

async fn login(State(hits): State<Hits>, headers: HeaderMap, body: String) -> impl IntoResponse {
    hits.hit();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|it| it.to_str().ok())
        .unwrap_or_default()
        .to_string();
    format!("{content_type}\n{body}")
}

async fn upload(State(hits): State<Hits>, Path(name): Path<String>, body: Bytes) -> impl IntoResponse {
    hits.hit();
    Json(json!({ "name": name, "size": body.len() }))
}

async fn status(State(hits): State<Hits>, Path(code): Path<u16>) -> impl IntoResponse {
    hits.hit();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "plain failure")
}

async fn start() -> anyhow::Result<(ApiClient, Hits)> {
    init_tracing();
    let hits = Hits::default();
    let app = Router::new()
        .route("/api/pets", get(list_pets).post(add_pet))
        .route("/api/pets/{petId}", get(show_pet))
        .route("/api/login", axum::routing::post(login))
        .route("/api/files/{name}", put(upload))
        .route("/api/status/{code}", get(status))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let specification: Specification = PETSTORE.parse()?;
    let client = ApiClient::builder()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .build(specification)?;
    Ok((client, hits))
}

#[tokio::test]
async fn test_get_is_cached() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    let first = client.call("listPets").with_param("limit", 2).await?;
    let second = client.call("listPets").with_param("limit", 2).await?;

    assert_eq!(first.source(), ResponseSource::Http);
    assert_eq!(second.source(), ResponseSource::Cache);
    assert_eq!(first.body(), second.body());
    assert_eq!(first.url(), "/api/pets?limit=2");
    assert_eq!(hits.count(), 1);
    assert_eq!(
        client.cached("listPets").map(|it| it.url().to_string()),
        Some("/api/pets?limit=2".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_cache_is_keyed_by_url() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    client.call("listPets").with_param("limit", 2).await?;
    let other = client.call("listPets").with_param("limit", 3).await?;

    assert_eq!(other.source(), ResponseSource::Http);
    assert_eq!(hits.count(), 2);
    assert_eq!(client.cache_len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_fresh_bypasses_cache_once() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    client.call("listPets").await?;
    let refreshed = client.fresh().call("listPets").await?;
    let cached = client.call("listPets").await?;

    assert_eq!(refreshed.source(), ResponseSource::Http);
    assert_eq!(refreshed.as_json::<Value>()?["hit"], json!(2));
    assert_eq!(cached.source(), ResponseSource::Cache);
    assert_eq!(cached.as_json::<Value>()?["hit"], json!(2));
    assert_eq!(hits.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_fresh_call_keeps_client_flag_untouched() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    client.call("listPets").await?;
    client.call("listPets").fresh().await?;
    client.call("listPets").await?;

    assert_eq!(hits.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_query_uses_defaults_and_declaration_order() -> anyhow::Result<()> {
    let (client, _) = start().await?;

    let response = client.call("listPets").with_param("tag", "small dog").await?;

    assert_eq!(response.url(), "/api/pets?limit=10&tag=small%20dog");
    assert_eq!(
        response.as_json::<Value>()?["query"],
        json!({ "limit": "10", "tag": "small dog" })
    );
    Ok(())
}

#[tokio::test]
async fn test_json_body_and_headers() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    let response = client
        .call("addPet")
        .with_param("X-Request-Id", "req-1")
        .with_param("pet", json!({ "name": "kitty", "tags": ["cat"] }))
        .await?;

    let echoed: Value = response.as_json()?;
    insta::assert_json_snapshot!(echoed, @r#"
    {
      "contentType": "application/json",
      "requestId": "req-1",
      "body": {
        "name": "kitty",
        "tags": [
          "cat"
        ]
      }
    }
    "#);

    // POST responses are never cached
    client
        .call("addPet")
        .with_param("pet", json!({ "name": "kitty" }))
        .await?;
    assert_eq!(hits.count(), 2);
    assert!(client.cached("addPet").is_none());
    Ok(())
}

#[tokio::test]
async fn test_form_body() -> anyhow::Result<()> {
    let (client, _) = start().await?;

    let response = client
        .call("login")
        .with_input(Input::new().with("user", "jane doe").with("password", "s3cr&t"))
        .await?;

    assert_eq!(
        response.text(),
        "application/x-www-form-urlencoded\nuser=jane%20doe&password=s3cr%26t"
    );
    Ok(())
}

#[tokio::test]
async fn test_file_body_with_derived_operation_id() -> anyhow::Result<()> {
    let (client, _) = start().await?;

    let operation_id = "put-files-name";
    assert!(client.operation(operation_id).is_some());

    let response = client
        .call(operation_id)
        .with_param("name", "report.bin")
        .with_file("content", vec![0_u8; 64])
        .await?;

    assert_eq!(
        response.as_json::<Value>()?,
        json!({ "name": "report.bin", "size": 64 })
    );
    Ok(())
}

#[tokio::test]
async fn test_binding_error_sends_nothing() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    let error = client
        .call("login")
        .with_param("user", "jane")
        .await
        .expect_err("missing password");

    assert!(error.is_binding());
    assert_eq!(
        error.errors(),
        [ErrorRecord::new("Missing input: password", "/password")]
    );
    assert_eq!(hits.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_structured_server_errors() -> anyhow::Result<()> {
    let (client, _) = start().await?;

    let error = client
        .call("showPetById")
        .with_param("petId", 0)
        .await
        .expect_err("pet not found");

    assert!(matches!(error, CallError::ServerStructured { .. }));
    assert_eq!(error.status(), Some(404));
    assert_eq!(error.errors(), [ErrorRecord::new("Pet not found", "/petId")]);
    assert!(client.cached("showPetById").is_none());
    Ok(())
}

#[rstest]
#[case::bad_request(400)]
#[case::not_found(404)]
#[case::server_error(500)]
#[case::unavailable(503)]
#[tokio::test]
async fn test_unstructured_server_errors(#[case] code: u16) -> anyhow::Result<()> {
    let (client, _) = start().await?;

    let error = client
        .call("status")
        .with_param("code", code)
        .await
        .expect_err("error status");

    assert!(matches!(error, CallError::ServerUnstructured { .. }));
    assert_eq!(error.status(), Some(code));
    assert_eq!(
        error.errors(),
        [ErrorRecord::new(
            format!("Something very bad happened! Try again later. ({code})"),
            format!("/api/status/{code}")
        )]
    );
    assert_eq!(
        error.response().map(|it| it.text()),
        Some("plain failure".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_non_200_success_is_not_cached() -> anyhow::Result<()> {
    let (client, hits) = start().await?;

    let first = client.call("status").with_param("code", 204).await;
    let second = client.call("status").with_param("code", 204).await;

    assert!(first.is_err());
    assert!(second.is_err());
    assert_eq!(hits.count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_on_complete_receives_http_outcome() -> anyhow::Result<()> {
    let (client, _) = start().await?;
    let (sender, receiver) = tokio::sync::oneshot::channel();

    client
        .call("showPetById")
        .with_param("petId", 7)
        .on_complete(move |outcome| {
            let _ = sender.send(outcome);
        })
        .await?;

    let response = receiver.await??;
    assert_eq!(response.as_json::<Value>()?, json!({ "id": "7" }));
    Ok(())
}

#[tokio::test]
async fn test_prepare_matches_sent_request() -> anyhow::Result<()> {
    let (client, _) = start().await?;

    let input = Input::new().with("petId", "a b");
    let prepared = client.prepare("showPetById", &input)?;
    let response = client.call("showPetById").with_input(input).await?;

    assert_eq!(prepared.url(), "/api/pets/a%20b");
    assert_eq!(response.url(), prepared.url());
    Ok(())
}
