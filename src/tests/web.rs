use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::Config;
use crate::vector::{
    EmbeddingIndex, IndexCatalog, RecommendService, RecommendationEngine, SharedIndex,
};
use crate::web::{router, SharedState};

fn index(dimension: usize, rows: &[(&str, Vec<f32>)]) -> SharedIndex {
    let mut index = EmbeddingIndex::new(dimension).unwrap();
    for (id, vector) in rows {
        index.insert(id, vector).unwrap();
    }
    SharedIndex::new("test", index)
}

fn state_with_engine(config: Config) -> Arc<SharedState> {
    let catalog = IndexCatalog {
        place_content: index(1, &[("a", vec![1.0]), ("b", vec![0.0])]),
        place_image: index(1, &[("a", vec![0.0]), ("b", vec![1.0])]),
        post_content: index(1, &[]),
        post_image: index(1, &[]),
        users: index(2, &[("u1", vec![0.0, 1.0])]),
    };

    Arc::new(SharedState {
        config,
        recommender: RecommendService::with_engine(RecommendationEngine::new(catalog)),
    })
}

async fn call(state: Arc<SharedState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

#[tokio::test]
async fn test_plan_route() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(SharedState::new(Config::load_with(dir.path()).unwrap()));

    let (status, body) = call(
        state,
        "POST",
        "/api/route/plan",
        Some(json!({
            "points": [
                {"name": "B", "latitude": 0.0, "longitude": 1.0},
                {"name": "A", "latitude": 0.0, "longitude": 0.0}
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route"][0]["name"], "A");
    assert_eq!(body["route"][1]["name"], "B");
    assert!(body["length"].as_f64().unwrap() > 100_000.0);
}

#[tokio::test]
async fn test_sample_route() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(SharedState::new(Config::load_with(dir.path()).unwrap()));

    let (status, body) = call(
        state.clone(),
        "POST",
        "/api/route/sample",
        Some(json!({"encoded_polyline": "_p~iF~ps|U_ulLnnqC_mqNvxq`@"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"].as_array().unwrap().len(), 3);
    assert_eq!(body["sampled_points"].as_array().unwrap().len(), 3);
    assert_eq!(body["points"][0]["latitude"], 38.5);

    let (status, body) = call(
        state.clone(),
        "POST",
        "/api/route/sample",
        Some(json!({"encoded_polyline": "_p~iF~ps|U_"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("polyline"));

    let (status, _) = call(
        state,
        "POST",
        "/api/route/sample",
        Some(json!({"encoded_polyline": "_p~iF~ps|U", "interval_meters": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_places() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with_engine(Config::load_with(dir.path()).unwrap());

    let (status, body) = call(
        state.clone(),
        "POST",
        "/api/recommend/places",
        Some(json!({"candidate_ids": ["a", "b", "c"], "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["id"], "b");
    assert_eq!(body["results"][0]["score"], 1.0);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let (status, body) = call(
        state.clone(),
        "POST",
        "/api/recommend/places",
        Some(json!({"k": 1, "candidate_ids": ["a"], "user_id": "nobody"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nobody"));

    let (status, body) = call(
        state,
        "POST",
        "/api/recommend/posts",
        Some(json!({"candidate_ids": ["x"], "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn test_indexes_listing() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_with_engine(Config::load_with(dir.path()).unwrap());

    let (status, body) = call(state, "GET", "/api/indexes", None).await;
    assert_eq!(status, StatusCode::OK);

    let stats = body.as_array().unwrap();
    assert_eq!(stats.len(), 5);
    assert_eq!(stats[4]["dimension"], 2);
    assert_eq!(stats[4]["len"], 1);
}

#[tokio::test]
async fn test_recommend_without_indexes_fails() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(SharedState::new(Config::load_with(dir.path()).unwrap()));

    let (status, body) = call(
        state,
        "POST",
        "/api/recommend/places",
        Some(json!({"candidate_ids": ["a"], "user_id": "u1"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}
