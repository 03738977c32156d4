use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::{self, InvalidJanCode};
use crate::fetch::PageFetcher;
use crate::quote::{AggregatedAnswer, ShopQuote};
use crate::sources::SourceRegistry;

/// Shared, read-only wiring for the handlers. The fetcher sits behind a
/// trait object so HTTP tests can run against scripted pages.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SourceRegistry>,
    pub fetcher: Arc<dyn PageFetcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/prices", get(prices))
        .route("/api/analysis", get(analysis))
        // The UI is browser-hosted on another origin.
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct PriceQuery {
    #[serde(default)]
    jan: Option<String>,
}

struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<InvalidJanCode> for ApiError {
    fn from(_: InvalidJanCode) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "JAN code is required",
        }
    }
}

async fn lookup(state: &AppState, query: PriceQuery) -> Result<AggregatedAnswer, ApiError> {
    // A missing parameter and a malformed one get the same 400.
    let jan = query.jan.unwrap_or_default();
    let answer = aggregate::aggregate(&state.registry, state.fetcher.as_ref(), &jan).await?;
    Ok(answer)
}

/// Plain ordered quote list, one entry per registered source.
async fn prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<Vec<ShopQuote>>, ApiError> {
    let answer = lookup(&state, query).await?;
    Ok(Json(answer.prices))
}

/// Full answer with the pre-computed best quote and consolidated metadata.
async fn analysis(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<AggregatedAnswer>, ApiError> {
    let answer = lookup(&state, query).await?;
    Ok(Json(answer))
}
