//! Reverse geocoding: coordinates to address candidates.
//! Default backend is Nominatim (OpenStreetMap), which needs no API key.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::LocationError;
use crate::weather::Coordinate;

pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// One address candidate for a coordinate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub locality: Option<String>,
    pub sub_admin_area: Option<String>,
    pub admin_area: Option<String>,
}

impl Address {
    /// Locality, else sub-admin area, else admin area
    pub fn place_name(&self) -> Option<String> {
        self.locality
            .clone()
            .or_else(|| self.sub_admin_area.clone())
            .or_else(|| self.admin_area.clone())
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, coordinate: &Coordinate) -> Result<Vec<Address>, LocationError>;
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
}

impl From<NominatimAddress> for Address {
    fn from(addr: NominatimAddress) -> Self {
        Address {
            locality: addr
                .city
                .or(addr.town)
                .or(addr.village)
                .or(addr.municipality),
            sub_admin_area: addr.county.or(addr.state_district),
            admin_area: addr.state,
        }
    }
}

pub struct NominatimGeocoder {
    client: Client,
    url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, url: &str, user_agent: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coordinate: &Coordinate) -> Result<Vec<Address>, LocationError> {
        tracing::debug!(
            lat = %coordinate.latitude,
            lon = %coordinate.longitude,
            "Reverse geocoding"
        );

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("lat", coordinate.latitude.to_string()),
                ("lon", coordinate.longitude.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("zoom", "10".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::GeocodingFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocationError::GeocodingFailed(format!(
                "geocoder returned HTTP {}",
                response.status()
            )));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| LocationError::GeocodingFailed(e.to_string()))?;

        Ok(body.address.map(Address::from).into_iter().collect())
    }
}
