use crate::error::SearchError;
use crate::types::*;
use crate::{mcp, search, AppState};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const ANONYMOUS_CLIENT: &str = "anonymous";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/volunteer-opportunities/search", post(search_handler))
        .route("/api/test/:location", get(sample_handler))
        .route("/mcp/tools", get(mcp::list_tools))
        .route("/mcp/call", post(mcp::call_tool))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "sources": state.pipeline.source_names(),
        "cachedSearches": state.cache.len(),
        "trackedClients": state.limiter.tracked_clients(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Response {
    let client_id = client_id(&headers);
    let criteria = match SearchCriteria::from_request(&request) {
        Ok(criteria) => criteria,
        Err(e) => return error_response(&e),
    };
    info!(client = %client_id, location = %criteria.location_text(), "search request");

    match search::search_opportunities(&state, &client_id, &criteria).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Sample catalog for a location. No source is contacted.
async fn sample_handler(
    State(state): State<Arc<AppState>>,
    Path(location): Path<String>,
) -> Response {
    match SearchCriteria::new(&location) {
        Ok(criteria) => Json(state.pipeline.sample(&criteria).await).into_response(),
        Err(e) => error_response(&e),
    }
}

/// First `x-forwarded-for` hop, then `x-client-id`, else anonymous.
pub fn client_id(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let explicit = headers
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or(explicit)
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

pub fn error_response(error: &SearchError) -> Response {
    match error {
        SearchError::InvalidInput(_) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: error.to_string(),
                retry_after_secs: None,
            }),
        )
            .into_response(),
        SearchError::RateLimitExceeded { retry_after_secs } => {
            warn!(retry_after_secs, "rejecting rate-limited request");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    error: error.to_string(),
                    retry_after_secs: Some(*retry_after_secs),
                }),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers), ANONYMOUS_CLIENT);

        headers.insert("x-client-id", HeaderValue::from_static("web-app"));
        assert_eq!(client_id(&headers), "web-app");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_id(&headers), "203.0.113.7");
    }

    #[test]
    fn rate_limit_maps_to_429_with_retry_after() {
        let response = error_response(&SearchError::RateLimitExceeded {
            retry_after_secs: 30,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let response = error_response(&SearchError::InvalidInput("location is required".into()));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
