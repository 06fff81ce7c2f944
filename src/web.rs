use crate::{
    config::Config,
    errors::{AppError, ErrorKind},
    geo::{GeoPoint, LatLng, SampledPolyline},
    route::{Corner, Optimization, RoutePlan},
    vector::{CatalogKind, IndexStats, RecommendService, Recommendation},
};
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

pub struct SharedState {
    pub config: Config,
    pub recommender: RecommendService,
}

impl SharedState {
    pub fn new(config: Config) -> Self {
        let recommender =
            RecommendService::new(config.indexes.clone(), config.base_path().to_path_buf());
        Self {
            config,
            recommender,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/api/route/plan", post(plan_route))
        .route("/api/route/sample", post(sample_route))
        .route("/api/recommend/places", post(recommend_places))
        .route("/api/recommend/posts", post(recommend_posts))
        .route("/api/indexes", get(indexes))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn start_app(config: Config, addr: String) -> anyhow::Result<()> {
    let shared_state = Arc::new(SharedState::new(config));
    let app = router(shared_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config, addr: Option<String>) -> anyhow::Result<()> {
    let addr = addr.unwrap_or_else(|| config.listen_addr.clone());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config, addr))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.kind() {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Run CPU-bound work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, HttpError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("blocking task failed")?
        .map_err(HttpError)
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub points: Vec<GeoPoint>,
    pub corner: Option<Corner>,
    pub optimization: Option<Optimization>,
}

async fn plan_route(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<PlanRequest>,
) -> Result<Json<RoutePlan>, HttpError> {
    let corner = payload.corner.unwrap_or(state.config.default_corner);
    let optimization = payload
        .optimization
        .unwrap_or(state.config.route_optimization);

    log::debug!(
        "planning {} points from {corner:?} with {optimization:?}",
        payload.points.len()
    );

    blocking(move || Ok(RoutePlan::new(&payload.points, corner, optimization)))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub encoded_polyline: String,
    pub interval_meters: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub points: Vec<LatLng>,
    pub sampled_points: Vec<LatLng>,
    pub length_meters: f64,
}

async fn sample_route(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SampleRequest>,
) -> Result<Json<SampleResponse>, HttpError> {
    let interval = payload
        .interval_meters
        .unwrap_or(state.config.sample_interval_meters);
    if !(interval.is_finite() && interval > 0.0) {
        return Err(AppError::Invalid(format!("interval_meters must be positive, got {interval}")).into());
    }

    let sampled = SampledPolyline::from_encoded(&payload.encoded_polyline, interval)?;

    Ok(Json(SampleResponse {
        points: sampled.display_points().to_vec(),
        length_meters: sampled.path_length(),
        sampled_points: sampled.samples,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub k: Option<usize>,
    pub candidate_ids: Vec<String>,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub results: Vec<Recommendation>,
}

async fn recommend(
    state: Arc<SharedState>,
    kind: CatalogKind,
    payload: RecommendRequest,
) -> Result<Json<RecommendResponse>, HttpError> {
    let k = payload.k.unwrap_or(state.config.recommend_limit);

    blocking(move || {
        let engine = state.recommender.engine()?;
        let results = engine.recommend(kind, k, &payload.candidate_ids, &payload.user_id)?;
        Ok(RecommendResponse { results })
    })
    .await
    .map(Json)
}

async fn recommend_places(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, HttpError> {
    recommend(state, CatalogKind::Places, payload).await
}

async fn recommend_posts(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, HttpError> {
    recommend(state, CatalogKind::Posts, payload).await
}

async fn indexes(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<Vec<IndexStats>>, HttpError> {
    blocking(move || {
        let engine = state.recommender.engine()?;
        Ok(engine.catalog().stats()?)
    })
    .await
    .map(Json)
}
