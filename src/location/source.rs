use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::LocationError;
use crate::weather::Coordinate;

pub const IP_API_URL: &str = "http://ip-api.com/json";

/// Update intervals below this are raised to it
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// How precise a requested fix should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    #[default]
    High,
    Balanced,
    Low,
}

/// Parameters for a location update subscription
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub accuracy: Accuracy,
    pub interval: Duration,
    pub min_interval: Duration,
    pub wait_for_accurate: bool,
}

impl UpdateRequest {
    /// High accuracy, 10s interval, 5s minimum, no waiting for an accurate fix
    pub fn one_shot() -> Self {
        Self {
            accuracy: Accuracy::High,
            interval: Duration::from_secs(10),
            min_interval: Duration::from_secs(5),
            wait_for_accurate: false,
        }
    }

    pub fn with_accuracy(mut self, accuracy: Accuracy) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        let interval = interval.max(MIN_UPDATE_INTERVAL);
        self.interval = interval;
        self.min_interval = self.min_interval.min(interval);
        self
    }
}

/// An active update subscription.
///
/// Fixes arrive on `fixes` until `cancel` is triggered; the producer must stop
/// and drop its sender once the token is cancelled.
pub struct LocationUpdates {
    pub fixes: mpsc::Receiver<Coordinate>,
    pub cancel: CancellationToken,
}

/// Device location service boundary
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Last cached fix, if the service has one
    async fn last_known(&self) -> Result<Option<Coordinate>, LocationError>;

    /// Subscribe to location updates
    fn request_updates(&self, request: UpdateRequest) -> Result<LocationUpdates, LocationError>;
}

/// Source pinned to a configured coordinate
pub struct FixedLocationSource {
    coordinate: Option<Coordinate>,
}

impl FixedLocationSource {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl LocationSource for FixedLocationSource {
    async fn last_known(&self) -> Result<Option<Coordinate>, LocationError> {
        Ok(self.coordinate.clone())
    }

    fn request_updates(&self, _request: UpdateRequest) -> Result<LocationUpdates, LocationError> {
        let (tx, rx) = mpsc::channel(1);
        if let Some(coordinate) = self.coordinate.clone() {
            // Capacity 1 and a fresh channel: cannot be full
            let _ = tx.try_send(coordinate);
        }
        Ok(LocationUpdates {
            fixes: rx,
            cancel: CancellationToken::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

/// Approximate location from IP geolocation (ip-api.com compatible)
pub struct IpLocationSource {
    client: Client,
    url: String,
    last: Arc<Mutex<Option<Coordinate>>>,
}

impl IpLocationSource {
    pub fn new(client: Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            last: Default::default(),
        }
    }

    async fn lookup(client: &Client, url: &str) -> Result<Coordinate, LocationError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::Unavailable(format!(
                "IP lookup returned HTTP {}",
                response.status()
            )));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => {
                let coordinate = Coordinate::new(lat, lon);
                Ok(match body.city {
                    Some(city) if !city.is_empty() => coordinate.with_name(city),
                    _ => coordinate,
                })
            }
            _ => Err(LocationError::Unavailable(
                body.message
                    .unwrap_or_else(|| "IP lookup returned no position".to_string()),
            )),
        }
    }
}

#[async_trait]
impl LocationSource for IpLocationSource {
    async fn last_known(&self) -> Result<Option<Coordinate>, LocationError> {
        Ok(self.last.lock().clone())
    }

    fn request_updates(&self, request: UpdateRequest) -> Result<LocationUpdates, LocationError> {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let client = self.client.clone();
        let url = self.url.clone();
        let last = Arc::clone(&self.last);
        let token = cancel.clone();

        tracing::debug!(
            accuracy = ?request.accuracy,
            interval_secs = request.interval.as_secs(),
            min_interval_secs = request.min_interval.as_secs(),
            wait_for_accurate = request.wait_for_accurate,
            "Starting IP location updates"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(request.interval.max(MIN_UPDATE_INTERVAL));
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match Self::lookup(&client, &url).await {
                    Ok(fix) => {
                        *last.lock() = Some(fix.clone());
                        if tx.send(fix).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "IP location lookup failed"),
                }
            }
            tracing::debug!("IP location updates stopped");
        });

        Ok(LocationUpdates { fixes: rx, cancel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fixed_source_yields_configured_coordinate() {
        let source = FixedLocationSource::new(Some(Coordinate::new(55.75, 37.62)));

        assert_eq!(
            source.last_known().await.unwrap(),
            Some(Coordinate::new(55.75, 37.62))
        );

        let mut updates = source.request_updates(UpdateRequest::one_shot()).unwrap();
        assert_eq!(updates.fixes.recv().await, Some(Coordinate::new(55.75, 37.62)));
        assert_eq!(updates.fixes.recv().await, None);
    }

    #[tokio::test]
    async fn test_fixed_source_without_coordinate_closes_stream() {
        let source = FixedLocationSource::new(None);

        assert_eq!(source.last_known().await.unwrap(), None);
        let mut updates = source.request_updates(UpdateRequest::one_shot()).unwrap();
        assert_eq!(updates.fixes.recv().await, None);
    }

    #[tokio::test]
    async fn test_ip_source_emits_fix_and_caches_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "lat": 59.93,
                "lon": 30.31,
                "city": "Saint Petersburg"
            })))
            .mount(&server)
            .await;

        let source = IpLocationSource::new(Client::new(), &server.uri());
        assert_eq!(source.last_known().await.unwrap(), None);

        let mut updates = source.request_updates(UpdateRequest::one_shot()).unwrap();
        let fix = updates.fixes.recv().await.unwrap();
        updates.cancel.cancel();

        assert_eq!(fix.latitude, 59.93);
        assert_eq!(fix.longitude, 30.31);
        assert_eq!(fix.name.as_deref(), Some("Saint Petersburg"));
        assert_eq!(source.last_known().await.unwrap(), Some(fix));
    }

    #[test]
    fn test_with_interval_raises_zero_to_minimum() {
        let request = UpdateRequest::one_shot().with_interval(Duration::ZERO);

        assert_eq!(request.interval, MIN_UPDATE_INTERVAL);
        assert_eq!(request.min_interval, MIN_UPDATE_INTERVAL);
    }

    #[tokio::test]
    async fn test_ip_source_survives_zero_interval() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "lat": 43.24,
                "lon": 76.89
            })))
            .mount(&server)
            .await;

        let source = IpLocationSource::new(Client::new(), &server.uri());
        let request = UpdateRequest {
            interval: Duration::ZERO,
            ..UpdateRequest::one_shot()
        };
        let mut updates = source.request_updates(request).unwrap();

        assert_eq!(updates.fixes.recv().await, Some(Coordinate::new(43.24, 76.89)));
        updates.cancel.cancel();
    }

    #[tokio::test]
    async fn test_ip_source_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail",
                "message": "reserved range"
            })))
            .mount(&server)
            .await;

        let source = IpLocationSource::new(Client::new(), &server.uri());
        let mut updates = source.request_updates(UpdateRequest::one_shot()).unwrap();
        updates.cancel.cancel();

        // Producer drops its sender once cancelled
        assert_eq!(updates.fixes.recv().await, None);
    }
}
