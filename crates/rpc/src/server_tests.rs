//! Router tests for the prediction endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use salescast_forecast_core::gbdt::{Model, Node, Tree};
use salescast_forecast_core::{
    ArtifactPaths, EncodingMaps, JoinMissPolicy, PredictionService, ServiceConfig,
    ServiceContext, StoreTable, TransformPolicy, UnknownCategoryPolicy,
};
use salescast_types::StoreAttributes;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::server::{build_router, AppState};

fn store(store: i64) -> StoreAttributes {
    StoreAttributes {
        store,
        store_type: Some("c".into()),
        assortment: Some("a".into()),
        competition_distance: 1270.0,
        competition_open_since_month: 9.0,
        competition_open_since_year: 2008.0,
        promo2: 0.0,
        promo2_since_week: 0.0,
        promo2_since_year: 0.0,
        promo_interval: Some("0".into()),
    }
}

fn ready_service() -> PredictionService {
    service_with_policy(TransformPolicy::default())
}

fn service_with_policy(policy: TransformPolicy) -> PredictionService {
    // Promo off: 4000, on: 6000
    let tree = Tree::new(
        vec![
            Node::internal(0, 0, 0.5, 1, 2),
            Node::leaf(1, 4000.0),
            Node::leaf(2, 6000.0),
        ],
        1.0,
    );
    let model = Model::new(vec!["Promo".to_string()], vec![tree], 0.0);
    let maps = EncodingMaps::new().with_column("Promo", [("0", 0.0), ("1", 1.0)]);
    let stores = StoreTable::from_rows(vec![store(1), store(2)]).unwrap();
    let context = ServiceContext::new(stores, maps, Arc::new(model), policy).unwrap();
    PredictionService::ready(context, 3)
}

fn router(service: PredictionService) -> Router {
    build_router(Arc::new(AppState::new(service)))
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn predict_returns_results_in_order() {
    let body = json!([
        {"Id": 1, "Store": 1, "DayOfWeek": 5, "Date": "2015-07-31", "Open": 1, "Promo": 1, "StateHoliday": "0", "SchoolHoliday": 1},
        {"Id": 2, "Store": 2, "DayOfWeek": 5, "Date": "2015-07-31", "Open": 0, "Promo": 1, "StateHoliday": "0", "SchoolHoliday": 1},
        {"Id": 3, "Store": 2, "DayOfWeek": 5, "Date": "2015-07-31", "Open": 1, "Promo": 0, "StateHoliday": "0", "SchoolHoliday": 0}
    ]);
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        value,
        json!([
            {"Id": 1, "Sales": 6000.0},
            {"Id": 2, "Sales": 0.0},
            {"Id": 3, "Sales": 4000.0}
        ])
    );
}

#[tokio::test]
async fn predict_accepts_boolean_flags_and_defaults() {
    let body = json!([{"Id": 8, "Promo": true, "Open": true}]);
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!([{"Id": 8, "Sales": 6000.0}]));
}

#[tokio::test]
async fn invalid_record_is_unprocessable() {
    let body = json!([{"Id": 1, "Store": 2000}]);
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(value["error"], "Store must be >=1 and <=1115");
    assert_eq!(value["field"], "Store");
}

#[tokio::test]
async fn invalid_date_message() {
    let body = json!([{"Id": 1, "Date": "2015-02-30"}]);
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(value["error"], "Invalid Date! Print date in format YYYY-MM-DD");
    assert_eq!(value["field"], "Date");
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let body = json!([{"Id": 1}, {"Id": 2}, {"Id": 3}, {"Id": 4}]);
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", body.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(value["error"].as_str().unwrap().contains("limit of 3"));
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", "[{\"Id\": ".to_string()),
    )
    .await;

    assert!(status.is_client_error(), "{status}");
    assert!(value["error"].is_string());
}

#[tokio::test]
async fn empty_batch_returns_empty_list() {
    let (status, value) = send_json(
        router(ready_service()),
        post_json("/predict", "[]".to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!([]));
}

#[tokio::test]
async fn health_reports_ready_service() {
    let (status, value) = send_json(router(ready_service()), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "ready");
    assert_eq!(value["store_count"], 2);
    assert_eq!(value["model_hash"].as_str().unwrap().len(), 64);
    assert!(value.get("reason").is_none());
}

#[tokio::test]
async fn unready_service_reports_reason() {
    let dir = tempfile::tempdir().unwrap();
    let service =
        PredictionService::from_artifacts(&ArtifactPaths::in_dir(dir.path()), ServiceConfig::default());
    let app = router(service);

    let (status, value) = send_json(app.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(value["status"], "unready");
    assert!(value["reason"]
        .as_str()
        .unwrap()
        .contains("encoding_maps.json"));

    let (status, value) = send_json(app, post_json("/predict", "[{\"Id\": 1}]".into())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(value["error"].as_str().unwrap().starts_with("service not ready"));
}

#[tokio::test]
async fn version_endpoint() {
    let (status, value) = send_json(router(ready_service()), get("/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["name"], "salescast");
    assert_eq!(value["version"], salescast_forecast_core::VERSION);
}

#[tokio::test]
async fn metrics_fallback_without_recorder() {
    let state = Arc::new(AppState::new(ready_service()));
    let app = build_router(state.clone());

    send(app.clone(), get("/version")).await;
    let (status, body) = send(app, get("/metrics")).await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("salescast_http_requests_total 1"), "{text}");
    assert!(text.contains("salescast_ready 1"));
}

#[tokio::test]
async fn oversized_body_is_rejected_before_decoding() {
    let mut state = AppState::new(ready_service());
    state.max_body_bytes = 64;
    let router = build_router(Arc::new(state));

    let body = json!([
        {"Id": 1, "Store": 1, "Date": "2015-07-31"},
        {"Id": 2, "Store": 2, "Date": "2015-07-31"}
    ]);
    assert!(body.to_string().len() > 64);
    let (status, _) = send(router, post_json("/predict", body.to_string())).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn rejected_join_miss_names_store_field() {
    let service = service_with_policy(TransformPolicy {
        join_miss: JoinMissPolicy::Reject,
        ..TransformPolicy::default()
    });
    let body = json!([{"Id": 5, "Store": 3}]);
    let (status, value) =
        send_json(router(service), post_json("/predict", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(value["field"], "Store");
}

#[tokio::test]
async fn rejected_unknown_category_names_column() {
    let service = service_with_policy(TransformPolicy {
        unknown_category: UnknownCategoryPolicy::Reject,
        ..TransformPolicy::default()
    });
    // only Promo has an encoding map
    let body = json!([{"Id": 6, "Store": 1, "StateHoliday": "0"}]);
    let (status, value) =
        send_json(router(service), post_json("/predict", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(value["field"], "StateHoliday");
}
