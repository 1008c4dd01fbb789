use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

// ============================================================================
// Domain types
// ============================================================================

/// A latitude/longitude pair, optionally carrying a display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Zero coordinates standing in for a place only known by name
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(0.0, 0.0).with_name(name)
    }
}

/// One current-weather observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReading {
    pub city_name: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub humidity: u32,
    pub pressure: u32,
    pub wind_speed: f64,
    /// Degrees; 0 when the provider omits it
    pub wind_direction: u32,
    pub description: String,
    pub icon: String,
    pub cloudiness: u32,
    /// Unix seconds, UTC
    pub sunrise: i64,
    pub sunset: i64,
    /// Shift from UTC in seconds
    pub timezone: i32,
    pub timestamp: i64,
    /// Response body exactly as received, kept for diagnostics
    #[serde(skip)]
    pub raw_payload: String,
    /// Rain volume over the last hour, mm
    pub rain: Option<f64>,
    /// Snow volume over the last hour, mm
    pub snow: Option<f64>,
    pub is_favorite: bool,
}

impl WeatherReading {
    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.timezone)
    }

    fn local_time(&self, unix_secs: i64) -> Option<DateTime<FixedOffset>> {
        self.offset()?.timestamp_opt(unix_secs, 0).single()
    }

    pub fn sunrise_local(&self) -> Option<DateTime<FixedOffset>> {
        self.local_time(self.sunrise)
    }

    pub fn sunset_local(&self) -> Option<DateTime<FixedOffset>> {
        self.local_time(self.sunset)
    }

    pub fn observed_at_local(&self) -> Option<DateTime<FixedOffset>> {
        self.local_time(self.timestamp)
    }
}

/// Whole degrees, truncated toward zero: 15.7 -> "15°C"
pub fn format_temperature(temp: f64) -> String {
    format!("{}°C", temp.trunc() as i64)
}

// ============================================================================
// OpenWeatherMap current weather response (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct OwmCurrentResponse {
    pub coord: Option<OwmCoord>,
    pub name: String,
    pub timezone: i32,
    pub dt: i64,
    pub main: OwmMain,
    pub wind: OwmWind,
    pub sys: OwmSys,
    pub weather: Vec<OwmCondition>,
    pub clouds: OwmClouds,
    pub rain: Option<OwmPrecipitation>,
    pub snow: Option<OwmPrecipitation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmMain {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u32,
    pub pressure: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmWind {
    pub speed: f64,
    #[serde(default)]
    pub deg: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmSys {
    pub country: String,
    pub sunrise: i64,
    pub sunset: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmCondition {
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmClouds {
    pub all: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OwmPrecipitation {
    #[serde(rename = "1h")]
    pub one_hour: Option<f64>,
}

impl OwmCurrentResponse {
    /// Coordinate embedded in the body, named after the reported city
    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coord
            .as_ref()
            .map(|c| Coordinate::new(c.lat, c.lon).with_name(self.name.clone()))
    }

    /// Map into a reading; `None` when the `weather` array is empty
    pub fn into_reading(self, raw_payload: String) -> Option<WeatherReading> {
        let condition = self.weather.into_iter().next()?;

        Some(WeatherReading {
            city_name: self.name,
            country: self.sys.country,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            min_temp: self.main.temp_min,
            max_temp: self.main.temp_max,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            description: condition.description,
            icon: condition.icon,
            cloudiness: self.clouds.all,
            sunrise: self.sys.sunrise,
            sunset: self.sys.sunset,
            timezone: self.timezone,
            timestamp: self.dt,
            raw_payload,
            rain: self.rain.and_then(|r| r.one_hour),
            snow: self.snow.and_then(|s| s.one_hour),
            is_favorite: false,
        })
    }
}
