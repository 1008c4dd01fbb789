use config::{Case, Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::coordinator::{DEFAULT_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL};
use crate::image::ICON_BASE_URL;
use crate::location::{
    Accuracy, LocationPermissions, IP_API_URL, MIN_UPDATE_INTERVAL, NOMINATIM_REVERSE_URL,
};
use crate::weather::{Coordinate, OPENWEATHERMAP_BASE_URL};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// OpenWeatherMap API key
    pub openweathermap_api_key: String,

    /// Temperature units: metric, imperial, or standard
    #[serde(default = "default_units")]
    pub units: String,

    /// Base URL of the OpenWeatherMap API
    #[serde(default = "default_weather_api_url")]
    pub weather_api_url: String,

    /// Base URL for weather icon images
    #[serde(default = "default_icon_base_url")]
    pub icon_base_url: String,

    /// Seconds between automatic weather refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Overall timeout for outbound HTTP requests
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationProviderKind {
    /// Approximate position from the public IP address
    #[default]
    Ip,
    /// Position given by `latitude`/`longitude`
    Fixed,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    #[serde(default)]
    pub provider: LocationProviderKind,

    /// Fixed provider coordinates
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Optional display name for the fixed coordinate
    #[serde(default)]
    pub name: Option<String>,

    /// IP geolocation endpoint (ip-api.com JSON format)
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    #[serde(default)]
    pub accuracy: Accuracy,

    /// Longest wait for a fresh fix
    #[serde(default = "default_fix_timeout_secs")]
    pub fix_timeout_secs: u64,

    /// Interval between updates while a fix is pending
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    #[serde(default)]
    pub permissions: LocationPermissions,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: LocationProviderKind::default(),
            latitude: None,
            longitude: None,
            name: None,
            ip_lookup_url: default_ip_lookup_url(),
            accuracy: Accuracy::default(),
            fix_timeout_secs: default_fix_timeout_secs(),
            update_interval_secs: default_update_interval_secs(),
            permissions: LocationPermissions::default(),
        }
    }
}

impl LocationConfig {
    /// Configured fixed coordinate; needs both latitude and longitude
    pub fn fixed_coordinate(&self) -> Option<Coordinate> {
        let coordinate = Coordinate::new(self.latitude?, self.longitude?);
        Some(match &self.name {
            Some(name) => coordinate.with_name(name.clone()),
            None => coordinate,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingConfig {
    /// Nominatim-compatible reverse geocoding endpoint
    #[serde(default = "default_geocoding_url")]
    pub url: String,

    /// Nominatim's usage policy requires an identifying User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            url: default_geocoding_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_weather_api_url() -> String {
    OPENWEATHERMAP_BASE_URL.to_string()
}

fn default_icon_base_url() -> String {
    ICON_BASE_URL.to_string()
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_ip_lookup_url() -> String {
    IP_API_URL.to_string()
}

fn default_fix_timeout_secs() -> u64 {
    30
}

fn default_update_interval_secs() -> u64 {
    10
}

fn default_geocoding_url() -> String {
    NOMINATIM_REVERSE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("weathervane/{}", env!("CARGO_PKG_VERSION"))
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .set_default("host", default_host())?
            .set_default("port", default_port())?
            .set_default("units", default_units())?
            .set_default("refresh_interval_secs", default_refresh_interval_secs())?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config.local").required(false))
            // WEATHERVANE_LOCATION__FIX_TIMEOUT_SECS -> location.fix_timeout_secs
            .add_source(
                Environment::with_prefix("WEATHERVANE")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(Case::Snake)
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs < MIN_REFRESH_INTERVAL.as_secs() {
            return Err(ConfigError::Message(format!(
                "refresh_interval_secs must be at least {}",
                MIN_REFRESH_INTERVAL.as_secs()
            )));
        }
        if self.location.update_interval_secs < MIN_UPDATE_INTERVAL.as_secs() {
            return Err(ConfigError::Message(format!(
                "location.update_interval_secs must be at least {}",
                MIN_UPDATE_INTERVAL.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml(r#"openweathermap_api_key = "abc""#);

        assert_eq!(config.port, 3000);
        assert_eq!(config.units, "metric");
        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.weather_api_url, "https://api.openweathermap.org");
        assert_eq!(config.location.provider, LocationProviderKind::Ip);
        assert_eq!(config.location.fix_timeout_secs, 30);
        assert!(config.location.permissions.is_granted());
        assert!(config.location.fixed_coordinate().is_none());
        assert!(config.geocoding.user_agent.starts_with("weathervane/"));
    }

    #[test]
    fn test_fixed_location() {
        let config = from_toml(
            r#"
            openweathermap_api_key = "abc"

            [location]
            provider = "fixed"
            latitude = 55.75
            longitude = 37.62
            name = "Moscow"
            accuracy = "balanced"

            [location.permissions]
            fine = false
            "#,
        );

        assert_eq!(config.location.provider, LocationProviderKind::Fixed);
        assert_eq!(config.location.accuracy, Accuracy::Balanced);
        assert_eq!(
            config.location.fixed_coordinate(),
            Some(Coordinate::new(55.75, 37.62).with_name("Moscow"))
        );
        assert!(!config.location.permissions.fine);
        assert!(config.location.permissions.coarse);
    }

    #[test]
    fn test_fixed_coordinate_needs_both_axes() {
        let config = from_toml(
            r#"
            openweathermap_api_key = "abc"

            [location]
            latitude = 55.75
            "#,
        );

        assert!(config.location.fixed_coordinate().is_none());
    }

    #[test]
    fn test_defaults_pass_validation() {
        assert!(from_toml(r#"openweathermap_api_key = "abc""#).validate().is_ok());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let refresh = from_toml(
            r#"
            openweathermap_api_key = "abc"
            refresh_interval_secs = 0
            "#,
        );
        let err = refresh.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_interval_secs"));

        let updates = from_toml(
            r#"
            openweathermap_api_key = "abc"

            [location]
            update_interval_secs = 0
            "#,
        );
        let err = updates.validate().unwrap_err();
        assert!(err.to_string().contains("location.update_interval_secs"));
    }
}
