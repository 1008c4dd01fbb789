use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use super::models::{Coordinate, OwmCurrentResponse, WeatherReading};

pub const OPENWEATHERMAP_BASE_URL: &str = "https://api.openweathermap.org";
const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Failed to fetch weather data: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("API Error: {0}")]
    ApiError(u16),

    #[error("Invalid API response: {0}")]
    ParseError(String),
}

/// Weather reading for a city search, with the coordinates the API resolved
#[derive(Debug, Clone)]
pub struct CityWeather {
    pub reading: WeatherReading,
    pub coordinate: Coordinate,
}

/// Source of current weather readings
#[async_trait]
pub trait WeatherRepository: Send + Sync {
    /// Current weather at a coordinate
    async fn weather_for_coordinate(
        &self,
        coordinate: &Coordinate,
    ) -> Result<WeatherReading, WeatherError>;

    /// Current weather for a free-text city name
    async fn weather_for_city(&self, city: &str) -> Result<CityWeather, WeatherError>;
}

/// OpenWeatherMap "current weather" client
pub struct OpenWeatherMapClient {
    client: Client,
    api_key: String,
    base_url: String,
    units: String,
}

impl OpenWeatherMapClient {
    pub fn new(client: Client, api_key: &str, base_url: &str, units: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            units: units.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CURRENT_WEATHER_PATH)
    }

    /// Send the request and return the raw body of a 2xx response
    async fn fetch_body(&self, query: &[(&str, String)]) -> Result<String, WeatherError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(query)
            .query(&[("appid", &self.api_key), ("units", &self.units)])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = %status, "Received API response");

        if !status.is_success() {
            return Err(WeatherError::ApiError(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    fn parse(raw: &str) -> Result<OwmCurrentResponse, WeatherError> {
        serde_json::from_str(raw).map_err(|e| WeatherError::ParseError(e.to_string()))
    }

    fn into_reading(
        data: OwmCurrentResponse,
        raw: String,
    ) -> Result<WeatherReading, WeatherError> {
        data.into_reading(raw).ok_or_else(|| {
            WeatherError::ParseError("No weather information available".to_string())
        })
    }
}

#[async_trait]
impl WeatherRepository for OpenWeatherMapClient {
    async fn weather_for_coordinate(
        &self,
        coordinate: &Coordinate,
    ) -> Result<WeatherReading, WeatherError> {
        tracing::debug!(
            lat = %coordinate.latitude,
            lon = %coordinate.longitude,
            "Fetching weather by coordinate"
        );

        let raw = self
            .fetch_body(&[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
            ])
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Error fetching weather"))?;

        let reading = Self::into_reading(Self::parse(&raw)?, raw)?;

        tracing::info!(city = %reading.city_name, temp = %reading.temperature, "Weather data fetched successfully");

        Ok(reading)
    }

    async fn weather_for_city(&self, city: &str) -> Result<CityWeather, WeatherError> {
        tracing::debug!(city = %city, "Fetching weather by city");

        let raw = match self.fetch_body(&[("q", city.to_string())]).await {
            Err(WeatherError::ApiError(404)) => {
                return Err(WeatherError::CityNotFound(city.to_string()))
            }
            other => other?,
        };

        let data = Self::parse(&raw)?;
        let coordinate = data.coordinate().ok_or_else(|| {
            WeatherError::ParseError("Response has no coordinates".to_string())
        })?;
        let reading = Self::into_reading(data, raw)?;

        tracing::info!(
            city = %reading.city_name,
            lat = %coordinate.latitude,
            lon = %coordinate.longitude,
            temp = %reading.temperature,
            "City weather fetched successfully"
        );

        Ok(CityWeather {
            reading,
            coordinate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn london_body() -> serde_json::Value {
        serde_json::json!({
            "coord": {"lon": -0.1257, "lat": 51.5085},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "main": {
                "temp": 15.0,
                "feels_like": 14.2,
                "temp_min": 13.5,
                "temp_max": 16.1,
                "pressure": 1012,
                "humidity": 72
            },
            "wind": {"speed": 4.1, "deg": 250},
            "clouds": {"all": 20},
            "rain": {"1h": 0.3},
            "dt": 1700000000,
            "sys": {"country": "GB", "sunrise": 1699990000, "sunset": 1700020000},
            "timezone": 0,
            "name": "London"
        })
    }

    fn client_for(server: &MockServer) -> OpenWeatherMapClient {
        OpenWeatherMapClient::new(Client::new(), "test_api_key", &server.uri(), "metric")
    }

    #[tokio::test]
    async fn test_weather_for_coordinate_maps_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "51.5085"))
            .and(query_param("lon", "-0.1257"))
            .and(query_param("appid", "test_api_key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .mount(&server)
            .await;

        let reading = client_for(&server)
            .weather_for_coordinate(&Coordinate::new(51.5085, -0.1257))
            .await
            .unwrap();

        assert_eq!(reading.city_name, "London");
        assert_eq!(reading.country, "GB");
        assert_eq!(reading.temperature, 15.0);
        assert_eq!(reading.feels_like, 14.2);
        assert_eq!(reading.min_temp, 13.5);
        assert_eq!(reading.max_temp, 16.1);
        assert_eq!(reading.humidity, 72);
        assert_eq!(reading.pressure, 1012);
        assert_eq!(reading.wind_direction, 250);
        assert_eq!(reading.description, "clear sky");
        assert_eq!(reading.icon, "01d");
        assert_eq!(reading.cloudiness, 20);
        assert_eq!(reading.rain, Some(0.3));
        assert_eq!(reading.snow, None);
        assert!(!reading.is_favorite);
        assert!(reading.raw_payload.contains("\"London\""));
    }

    #[tokio::test]
    async fn test_missing_optional_fields_default() {
        let mut body = london_body();
        body["wind"] = serde_json::json!({"speed": 2.0});
        body["rain"] = serde_json::json!({"3h": 1.2});
        body.as_object_mut().unwrap().remove("snow");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let reading = client_for(&server)
            .weather_for_coordinate(&Coordinate::new(51.5, -0.12))
            .await
            .unwrap();

        assert_eq!(reading.wind_direction, 0);
        assert_eq!(reading.rain, None);
        assert_eq!(reading.snow, None);
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .weather_for_coordinate(&Coordinate::new(1.0, 2.0))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::ApiError(401)));
        assert_eq!(err.to_string(), "API Error: 401");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"name\": \"London\"}"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .weather_for_coordinate(&Coordinate::new(1.0, 2.0))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_weather_for_city_extracts_coordinate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_body()))
            .mount(&server)
            .await;

        let result = client_for(&server).weather_for_city("London").await.unwrap();

        assert_eq!(result.reading.temperature, 15.0);
        assert_eq!(result.reading.city_name, "London");
        assert_eq!(result.reading.country, "GB");
        assert_eq!(result.coordinate.latitude, 51.5085);
        assert_eq!(result.coordinate.longitude, -0.1257);
        assert_eq!(result.coordinate.name.as_deref(), Some("London"));
    }

    #[tokio::test]
    async fn test_weather_for_city_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .weather_for_city("Atlantis")
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::CityNotFound(ref c) if c == "Atlantis"));
    }

    #[tokio::test]
    async fn test_weather_for_city_requires_coordinates() {
        let mut body = london_body();
        body.as_object_mut().unwrap().remove("coord");

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .weather_for_city("London")
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::ParseError(_)));
    }
}
