use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::StatusCode;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::state::UiState;
use crate::error::HttpError;
use crate::image::{icon_url, ImageError, ImageLoader, ICON_BASE_URL};
use crate::impl_into_response;
use crate::location::LocationProvider;
use crate::weather::{CityWeather, Coordinate, WeatherRepository};

pub const LOCATION_ERROR_MESSAGE: &str = "Unable to get current location";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
/// Shortest accepted refresh period; tokio intervals cannot tick at zero
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("City name cannot be empty")]
    BlankCity,
}

impl HttpError for ValidationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BlankCity => "BLANK_CITY",
        }
    }
}

impl_into_response!(ValidationError);

/// Services the coordinator drives; all injected, none global
pub struct Collaborators {
    pub weather: Arc<dyn WeatherRepository>,
    pub location: Arc<dyn LocationProvider>,
    pub images: Arc<dyn ImageLoader>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Initial delay and period of the background refresh
    pub refresh_interval: Duration,
    pub icon_base_url: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            icon_base_url: ICON_BASE_URL.to_string(),
        }
    }
}

struct Inner {
    weather: Arc<dyn WeatherRepository>,
    location: Arc<dyn LocationProvider>,
    images: Arc<dyn ImageLoader>,
    icon_base_url: String,
    state: watch::Sender<UiState>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Sequences location lookup, geocoding and weather fetches into one
/// observable [`UiState`], and refreshes it on a timer.
///
/// Entry points are not serialized: overlapping calls (including the timer)
/// race on the state and the last write wins.
#[derive(Clone)]
pub struct WeatherCoordinator {
    inner: Arc<Inner>,
}

impl WeatherCoordinator {
    fn build(collaborators: Collaborators, options: &CoordinatorOptions) -> Self {
        let (state, _) = watch::channel(UiState::default());
        Self {
            inner: Arc::new(Inner {
                weather: collaborators.weather,
                location: collaborators.location,
                images: collaborators.images,
                icon_base_url: options.icon_base_url.clone(),
                state,
                refresh_task: Mutex::new(None),
            }),
        }
    }

    /// Create the coordinator, kick off a current-location fetch and start
    /// the periodic refresh. Must be called inside a tokio runtime.
    pub fn start(collaborators: Collaborators, options: CoordinatorOptions) -> Self {
        let coordinator = Self::build(collaborators, &options);

        coordinator.spawn_current_location_weather();

        if options.refresh_interval < MIN_REFRESH_INTERVAL {
            tracing::warn!(
                requested_ms = options.refresh_interval.as_millis() as u64,
                "Refresh interval too short, using the minimum"
            );
        }
        let task = spawn_auto_refresh(Arc::downgrade(&coordinator.inner), options.refresh_interval);
        *coordinator.inner.refresh_task.lock() = Some(task);

        tracing::info!(
            refresh_secs = options.refresh_interval.max(MIN_REFRESH_INTERVAL).as_secs(),
            "Weather coordinator started"
        );

        coordinator
    }

    /// Snapshot of the current state
    pub fn state(&self) -> UiState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.state.subscribe()
    }

    /// Stop the periodic refresh
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.refresh_task.lock().take() {
            task.abort();
            tracing::info!("Weather auto-refresh stopped");
        }
    }

    fn update(&self, modify: impl FnOnce(&mut UiState)) {
        self.inner.state.send_modify(modify);
    }

    fn begin_attempt(&self) {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    /// Await an attempt running on its own task. Dropping the caller leaves
    /// the attempt running, so `loading` is always cleared by the attempt itself.
    async fn run_detached(&self, attempt: JoinHandle<()>) {
        if let Err(e) = attempt.await {
            tracing::error!(error = %e, "Weather fetch task failed");
            self.update(|s| {
                s.loading = false;
                s.error = Some(e.to_string());
            });
        }
    }

    /// Like [`Self::fetch_current_location_weather`], but runs in the
    /// background. `loading` is already set when this returns.
    pub fn spawn_current_location_weather(&self) -> JoinHandle<()> {
        self.begin_attempt();
        let this = self.clone();
        tokio::spawn(async move { this.locate_and_fetch().await })
    }

    /// Locate the device, name the place (best effort), then fetch its weather
    pub async fn fetch_current_location_weather(&self) {
        let attempt = self.spawn_current_location_weather();
        self.run_detached(attempt).await;
    }

    async fn locate_and_fetch(&self) {
        let coordinate = match self.inner.location.current_location().await {
            Ok(coordinate) => coordinate,
            Err(e) => {
                tracing::warn!(error = %e, "Unable to get current location");
                self.update(|s| {
                    s.loading = false;
                    s.error = Some(LOCATION_ERROR_MESSAGE.to_string());
                });
                return;
            }
        };

        self.update(|s| s.location = Some(coordinate.clone()));

        // Geocoding failure only costs the display name
        match self.inner.location.city_name(&coordinate).await {
            Ok(city_name) => self.update(|s| s.city_name = city_name),
            Err(e) => tracing::warn!(error = %e, "Error getting city name"),
        }

        self.begin_attempt();
        self.fetch_for_coordinate(coordinate).await;
    }

    /// Fetch weather for a known coordinate
    pub async fn fetch_weather_for_location(&self, coordinate: Coordinate) {
        self.begin_attempt();
        let this = self.clone();
        let attempt = tokio::spawn(async move { this.fetch_for_coordinate(coordinate).await });
        self.run_detached(attempt).await;
    }

    async fn fetch_for_coordinate(&self, coordinate: Coordinate) {
        let result = self.inner.weather.weather_for_coordinate(&coordinate).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, lat = %coordinate.latitude, lon = %coordinate.longitude, "Weather fetch failed");
        }

        self.update(|s| {
            s.loading = false;
            match result {
                Ok(reading) => s.weather = Some(reading),
                Err(e) => s.error = Some(e.to_string()),
            }
        });
    }

    /// Fetch weather for a city name. Blank input is rejected before any
    /// request is made; fetch failures are reported through the state.
    pub async fn search_weather_by_city(&self, city: &str) -> Result<(), ValidationError> {
        let city = city.trim();
        if city.is_empty() {
            let err = ValidationError::BlankCity;
            self.update(|s| s.error = Some(err.to_string()));
            return Err(err);
        }

        self.begin_attempt();
        let this = self.clone();
        let city = city.to_string();
        let attempt = tokio::spawn(async move { this.fetch_for_city(&city).await });
        self.run_detached(attempt).await;

        Ok(())
    }

    async fn fetch_for_city(&self, city: &str) {
        match self.inner.weather.weather_for_city(city).await {
            Ok(CityWeather {
                reading,
                coordinate,
            }) => {
                tracing::debug!(
                    city = %reading.city_name,
                    lat = %coordinate.latitude,
                    lon = %coordinate.longitude,
                    "City search resolved"
                );
                self.update(|s| {
                    s.loading = false;
                    s.city_name = Some(reading.city_name.clone());
                    s.location = Some(Coordinate::placeholder(reading.city_name.clone()));
                    s.weather = Some(reading);
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, city = %city, "City search failed");
                self.update(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
            }
        }
    }

    /// Flip the favorite flag on the loaded reading. Returns false if nothing is loaded.
    pub fn toggle_favorite(&self) -> bool {
        self.inner.state.send_if_modified(|s| match s.weather.as_mut() {
            Some(reading) => {
                reading.is_favorite = !reading.is_favorite;
                true
            }
            None => false,
        })
    }

    /// Fetch the PNG for an icon code through the injected image loader
    pub async fn load_weather_icon(&self, icon_code: &str) -> Result<Bytes, ImageError> {
        let url = icon_url(&self.inner.icon_base_url, icon_code)?;
        self.inner.images.load(&url).await
    }
}

/// Re-fetch weather for the stored coordinate every `period`, first tick
/// after one full period. Exits once the coordinator is gone.
fn spawn_auto_refresh(inner: Weak<Inner>, period: Duration) -> JoinHandle<()> {
    let period = period.max(MIN_REFRESH_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(inner) = inner.upgrade() else {
                break;
            };
            let coordinator = WeatherCoordinator { inner };

            let location = coordinator.inner.state.borrow().location.clone();
            match location {
                Some(coordinate) => {
                    tracing::debug!("Auto-refreshing weather");
                    coordinator.fetch_weather_for_location(coordinate).await;
                }
                None => tracing::trace!("Auto-refresh skipped, no location yet"),
            }
        }
    })
}
