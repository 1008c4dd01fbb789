mod config;
mod coordinator;
mod error;
mod image;
mod location;
mod routes;
mod weather;

use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, LocationProviderKind};
use crate::coordinator::{Collaborators, CoordinatorOptions, UiState, WeatherCoordinator};
use crate::image::HttpImageLoader;
use crate::location::{
    DeviceLocationRepository, FixedLocationSource, IpLocationSource, LocationProvider,
    LocationSource, NominatimGeocoder, UpdateRequest,
};
use crate::weather::{format_temperature, OpenWeatherMapClient};

const HTTP_CONNECT_TIMEOUT_SECS: u64 = 5;
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: WeatherCoordinator,
}

/// Shared HTTP client for the weather API, geocoder, IP lookup and icons
fn create_http_client(config: &AppConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(10)
        .build()
}

fn create_location_source(config: &AppConfig, client: &Client) -> Arc<dyn LocationSource> {
    match config.location.provider {
        LocationProviderKind::Fixed => {
            let coordinate = config.location.fixed_coordinate();
            if coordinate.is_none() {
                tracing::warn!("Fixed location provider selected without latitude/longitude");
            }
            Arc::new(FixedLocationSource::new(coordinate))
        }
        LocationProviderKind::Ip => Arc::new(IpLocationSource::new(
            client.clone(),
            &config.location.ip_lookup_url,
        )),
    }
}

/// Log every published state change
fn spawn_state_logger(coordinator: &WeatherCoordinator) {
    let mut rx = coordinator.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state: UiState = rx.borrow_and_update().clone();
            let temperature = state
                .weather
                .as_ref()
                .map(|w| format_temperature(w.temperature))
                .unwrap_or_else(|| "-".to_string());
            tracing::debug!(
                phase = ?state.phase(),
                city = state.city_name.as_deref().unwrap_or("-"),
                temperature = %temperature,
                favorite = state.weather.as_ref().is_some_and(|w| w.is_favorite),
                error = state.error.as_deref().unwrap_or("-"),
                "Weather state changed"
            );
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weathervane=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    tracing::info!("Configuration loaded successfully");

    let http_client = create_http_client(&config)?;

    let location = Arc::new(DeviceLocationRepository::new(
        create_location_source(&config, &http_client),
        Arc::new(NominatimGeocoder::new(
            http_client.clone(),
            &config.geocoding.url,
            &config.geocoding.user_agent,
        )),
        Arc::new(config.location.permissions),
        UpdateRequest::one_shot()
            .with_accuracy(config.location.accuracy)
            .with_interval(Duration::from_secs(config.location.update_interval_secs)),
        Duration::from_secs(config.location.fix_timeout_secs),
    ));

    let weather = Arc::new(OpenWeatherMapClient::new(
        http_client.clone(),
        &config.openweathermap_api_key,
        &config.weather_api_url,
        &config.units,
    ));

    let coordinator = WeatherCoordinator::start(
        Collaborators {
            weather,
            location: location.clone(),
            images: Arc::new(HttpImageLoader::new(http_client)),
        },
        CoordinatorOptions {
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            icon_base_url: config.icon_base_url.clone(),
        },
    );
    spawn_state_logger(&coordinator);

    let state = AppState {
        coordinator: coordinator.clone(),
    };
    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown();
    location.stop_tracking();
    if let Some(fix) = location.last_fix() {
        tracing::debug!(lat = %fix.latitude, lon = %fix.longitude, "Last location fix");
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}
