use serde::Serialize;

use crate::weather::{Coordinate, WeatherReading};

/// Everything the presentation layer shows. Only the coordinator writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiState {
    pub location: Option<Coordinate>,
    pub city_name: Option<String>,
    pub weather: Option<WeatherReading>,
    /// True exactly while a fetch is outstanding
    pub loading: bool,
    /// Message from the last failed attempt; cleared when a new attempt starts
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Loaded,
    Errored,
}

impl UiState {
    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Errored
        } else if self.weather.is_some() {
            Phase::Loaded
        } else {
            Phase::Idle
        }
    }
}
