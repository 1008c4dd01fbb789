pub mod models;
pub mod service;

pub use models::{format_temperature, Coordinate, WeatherReading};
pub use service::{
    CityWeather, OpenWeatherMapClient, WeatherRepository, OPENWEATHERMAP_BASE_URL,
};
