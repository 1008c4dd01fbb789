use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{Phase, UiState, ValidationError};
use crate::image::ImageError;
use crate::weather::{format_temperature, Coordinate, WeatherReading};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// City name to search for
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// State as shown to clients, plus derived display fields
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_display: Option<String>,
    /// Sunrise, sunset and observation time in the reading's own timezone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_times: Option<LocalTimes>,
    #[serde(flatten)]
    pub state: UiState,
}

#[derive(Debug, Serialize)]
pub struct LocalTimes {
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub observed_at: Option<String>,
}

impl From<&WeatherReading> for LocalTimes {
    fn from(reading: &WeatherReading) -> Self {
        Self {
            sunrise: reading.sunrise_local().map(|t| t.to_rfc3339()),
            sunset: reading.sunset_local().map(|t| t.to_rfc3339()),
            observed_at: reading.observed_at_local().map(|t| t.to_rfc3339()),
        }
    }
}

impl From<UiState> for StateResponse {
    fn from(state: UiState) -> Self {
        Self {
            phase: state.phase(),
            temperature_display: state
                .weather
                .as_ref()
                .map(|w| format_temperature(w.temperature)),
            local_times: state.weather.as_ref().map(LocalTimes::from),
            state,
        }
    }
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /weather
pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    Json(state.coordinator.state().into())
}

/// POST /weather/current
pub async fn fetch_current_location(State(state): State<AppState>) -> Json<StateResponse> {
    state.coordinator.fetch_current_location_weather().await;
    Json(state.coordinator.state().into())
}

/// POST /weather/location with a JSON coordinate body
pub async fn fetch_for_location(
    State(state): State<AppState>,
    Json(coordinate): Json<Coordinate>,
) -> Json<StateResponse> {
    state.coordinator.fetch_weather_for_location(coordinate).await;
    Json(state.coordinator.state().into())
}

/// GET /weather/search?city=London
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<StateResponse>, ValidationError> {
    search_city(&state, &query.city).await
}

/// GET /weather/search/{city}
pub async fn search_by_path(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<StateResponse>, ValidationError> {
    search_city(&state, &city).await
}

async fn search_city(state: &AppState, city: &str) -> Result<Json<StateResponse>, ValidationError> {
    state.coordinator.search_weather_by_city(city).await?;
    Ok(Json(state.coordinator.state().into()))
}

/// POST /weather/favorite
pub async fn toggle_favorite(State(state): State<AppState>) -> Json<StateResponse> {
    if !state.coordinator.toggle_favorite() {
        tracing::debug!("Favorite toggle ignored, no reading loaded");
    }
    Json(state.coordinator.state().into())
}

/// GET /icons/{code}
pub async fn icon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ImageError> {
    let bytes = state.coordinator.load_weather_icon(&code).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
