use std::sync::Arc;

use airflow_mock::config::AppConfig;
use airflow_mock::{build_app, build_state, AppState};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state() -> AppState {
    build_state(&AppConfig::default()).unwrap()
}

fn app(state: &AppState) -> Router {
    build_app(Arc::clone(state))
}

async fn send(
    state: &AppState,
    method: Method,
    uri: &str,
    instance: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(instance) = instance {
        request = request.header("x-instance-id", instance);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_default_instance() {
    let state = test_state();
    let (status, body) = send(&state, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["default_instance"], "default");
    assert_eq!(body["instances"], 1);
}

#[tokio::test]
async fn test_create_and_list_dags() {
    let state = test_state();
    let (status, dag) = send(
        &state,
        Method::POST,
        "/api/v1/dags",
        None,
        Some(json!({"dag_id": "etl", "tags": [{"name": "nightly"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dag["dag_id"], "etl");

    let (status, body) = send(&state, Method::GET, "/api/v1/dags", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 1);
    assert_eq!(body["dags"][0]["dag_id"], "etl");

    let (status, body) = send(&state, Method::GET, "/api/v1/dags?tags=other", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 0);
}

#[tokio::test]
async fn test_duplicate_dag_is_conflict() {
    let state = test_state();
    let dag = json!({"dag_id": "etl"});
    send(&state, Method::POST, "/api/v1/dags", None, Some(dag.clone())).await;
    let (status, body) = send(&state, Method::POST, "/api/v1/dags", None, Some(dag)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn test_missing_entity_is_not_found() {
    let state = test_state();
    let (status, body) = send(&state, Method::GET, "/api/v1/dags/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = send(&state, Method::GET, "/api/v1/dags/nope/dagRuns", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_instance_header_is_rejected() {
    let state = test_state();
    let (status, body) = send(&state, Method::GET, "/api/v1/dags", Some("ghost"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "instance_not_found");
    assert!(!state.registry.contains("ghost"));
}

#[tokio::test]
async fn test_instances_are_isolated() {
    let state = test_state();
    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/instances",
        None,
        Some(json!({"instance_id": "staging"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send(
        &state,
        Method::POST,
        "/api/v1/variables",
        Some("staging"),
        Some(json!({"key": "env", "value": "staging"})),
    )
    .await;

    let (_, staging) = send(&state, Method::GET, "/api/v1/variables", Some("staging"), None).await;
    let (_, default) = send(&state, Method::GET, "/api/v1/variables", None, None).await;
    assert_eq!(staging["total_entries"], 1);
    assert_eq!(default["total_entries"], 0);
}

#[tokio::test]
async fn test_validation_errors_are_bad_request() {
    let state = test_state();
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/connections",
        None,
        Some(json!({"conn_id": "db"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert_eq!(body["field"], "conn_type");

    let (status, _) = send(&state, Method::GET, "/api/v1/dags?limit=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&state, Method::GET, "/api/v1/dags?order_by=color", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&state, Method::GET, "/api/v1/dags?limit=many", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_delete_dag_reports_cascade() {
    let state = test_state();
    send(&state, Method::POST, "/api/v1/dags", None, Some(json!({"dag_id": "etl"}))).await;
    send(
        &state,
        Method::POST,
        "/api/v1/dags/etl/dagRuns",
        None,
        Some(json!({"run_id": "r1"})),
    )
    .await;
    send(
        &state,
        Method::POST,
        "/api/v1/dags/etl/dagRuns/r1/taskInstances",
        None,
        Some(json!({"task_id": "extract"})),
    )
    .await;
    let (status, _) = send(
        &state,
        Method::POST,
        "/api/v1/dags/etl/dagRuns/r1/taskInstances/extract/xcomEntries",
        None,
        Some(json!({"key": "rows", "value": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&state, Method::DELETE, "/api/v1/dags/etl", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"removed": 1, "cascaded": 3}));

    let (status, _) = send(&state, Method::GET, "/api/v1/dags/etl", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_actions_and_logs() {
    let state = test_state();
    send(&state, Method::POST, "/api/v1/dags", None, Some(json!({"dag_id": "etl"}))).await;
    send(
        &state,
        Method::POST,
        "/api/v1/dags/etl/dagRuns",
        None,
        Some(json!({"run_id": "r1"})),
    )
    .await;
    send(
        &state,
        Method::POST,
        "/api/v1/dags/etl/dagRuns/r1/taskInstances",
        None,
        Some(json!({"task_id": "load"})),
    )
    .await;
    let task = "/api/v1/dags/etl/dagRuns/r1/taskInstances/load";

    let (status, action) = send(
        &state,
        Method::POST,
        &format!("{task}/setTaskInstanceState"),
        None,
        Some(json!({"new_state": "failed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(action["state"], "failed");

    let (status, log) = send(&state, Method::GET, &format!("{task}/logs/1"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["try_number"], 1);

    let (status, _) = send(&state, Method::GET, &format!("{task}/logs/0"), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&state, Method::GET, &format!("{task}/logs/9"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) =
        send(&state, Method::GET, &format!("{task}/logs/latest"), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, action) = send(
        &state,
        Method::POST,
        &format!("{task}/clearTaskInstance"),
        None,
        Some(json!({"only_running": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(action["state"], "failed");

    let (status, action) =
        send(&state, Method::POST, &format!("{task}/clearTaskInstance"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(action["state"], "none");
}

#[tokio::test]
async fn test_pool_slots_cannot_overcommit() {
    let state = test_state();
    send(
        &state,
        Method::POST,
        "/api/v1/pools",
        None,
        Some(json!({"name": "small", "slots": 4})),
    )
    .await;

    let (status, pool) = send(
        &state,
        Method::PATCH,
        "/api/v1/pools/small/slots",
        None,
        Some(json!({"used_slots": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pool["open_slots"], 1);

    let (status, _) = send(
        &state,
        Method::PATCH,
        "/api/v1/pools/small/slots",
        None,
        Some(json!({"queued_slots": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, pool) = send(&state, Method::GET, "/api/v1/pools/small", None, None).await;
    assert_eq!(pool["queued_slots"], 0);
    assert_eq!(pool["open_slots"], 1);
}

#[tokio::test]
async fn test_populate_instance_and_reject_repopulation() {
    let state = test_state();
    let (status, report) = send(
        &state,
        Method::POST,
        "/api/v1/instances/default/populate",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["inserted"]["dags"], 5);
    assert_eq!(report["inserted"]["pools"], 1);

    let (status, body) = send(
        &state,
        Method::POST,
        "/api/v1/instances/default/populate",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, report) = send(
        &state,
        Method::POST,
        "/api/v1/instances/default/populate?policy=merge",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["inserted"]["dags"], 0);

    let (status, hooks) = send(
        &state,
        Method::GET,
        "/api/v1/providers/postgres/hooks",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(hooks["total_entries"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_unknown_route_uses_error_shape() {
    let state = test_state();
    let (status, body) = send(&state, Method::GET, "/api/v2/dags", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}
