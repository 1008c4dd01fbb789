pub mod handlers;
mod service;
mod state;

pub use service::{
    Collaborators, CoordinatorOptions, ValidationError, WeatherCoordinator,
    DEFAULT_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL,
};
pub use state::{Phase, UiState};
