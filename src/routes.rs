use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    routing::{get, post},
    BoxError, Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::coordinator::handlers as weather_handlers;
use crate::AppState;

/// Slow upstreams (geocoder + weather API + location fix) share one budget
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Routes reading or driving the weather coordinator
fn weather_routes() -> Router<AppState> {
    Router::new()
        .route("/weather", get(weather_handlers::get_state))
        .route(
            "/weather/current",
            post(weather_handlers::fetch_current_location),
        )
        .route(
            "/weather/location",
            post(weather_handlers::fetch_for_location),
        )
        .route("/weather/search", get(weather_handlers::search))
        .route(
            "/weather/search/{city}",
            get(weather_handlers::search_by_path),
        )
        .route(
            "/weather/favorite",
            post(weather_handlers::toggle_favorite),
        )
        .route("/icons/{code}", get(weather_handlers::icon))
}

async fn handle_timeout_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", err),
        )
    }
}

/// Build the complete application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(weather_handlers::health))
        .route("/health", get(weather_handlers::health))
        .merge(weather_routes())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
