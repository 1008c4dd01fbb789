mod geocoder;
mod permissions;
mod repository;
mod source;

pub use geocoder::{Geocoder, NominatimGeocoder, NOMINATIM_REVERSE_URL};
pub use permissions::{LocationPermissions, PermissionCheck};
pub use repository::{DeviceLocationRepository, LocationProvider};
pub use source::{
    Accuracy, FixedLocationSource, IpLocationSource, LocationSource, LocationUpdates,
    UpdateRequest, IP_API_URL, MIN_UPDATE_INTERVAL,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Location permission not granted")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("Reverse geocoding failed: {0}")]
    GeocodingFailed(String),
}
