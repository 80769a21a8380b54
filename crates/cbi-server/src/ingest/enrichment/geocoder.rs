//! Reverse geocoding collaborator
//!
//! [`GoogleGeocoder`] speaks the Google Geocoding JSON API:
//! `GET {base}?latlng={lat},{lng}&key={key}` returning
//! `{"status": "...", "results": [{"formatted_address", "address_components"}]}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Default reverse-geocoding endpoint.
pub const DEFAULT_GEOCODER_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// One candidate returned by a reverse lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub formatted_address: String,
    pub postal_code: Option<String>,
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Http(reqwest::Error),

    #[error("geocoder returned status {status}: {message}")]
    Status { status: String, message: String },
}

/// The request URL carries the API key, so it never reaches error text.
impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        GeocodeError::Http(err.without_url())
    }
}

/// Coordinates to an ordered list of candidate addresses.
///
/// An empty list means the lookup succeeded but found nothing.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, location: Location) -> Result<Vec<Address>, GeocodeError>;
}

pub struct GoogleGeocoder {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl From<GeocodeResult> for Address {
    fn from(result: GeocodeResult) -> Self {
        let postal_code = result
            .address_components
            .into_iter()
            .find(|c| c.types.iter().any(|t| t == "postal_code"))
            .map(|c| c.long_name);

        Address {
            formatted_address: result.formatted_address,
            postal_code,
        }
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    async fn reverse(&self, location: Location) -> Result<Vec<Address>, GeocodeError> {
        let latlng = format!("{},{}", location.latitude, location.longitude);

        let response: GeocodeResponse = self
            .client
            .get(&self.base_url)
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" => Ok(response.results.into_iter().map(Address::from).collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(GeocodeError::Status {
                message: response.error_message.unwrap_or_default(),
                status: response.status,
            }),
        }
    }
}

/// Stand-in used when no API key is configured; every lookup fails.
pub struct UnconfiguredGeocoder;

#[async_trait]
impl ReverseGeocoder for UnconfiguredGeocoder {
    async fn reverse(&self, _location: Location) -> Result<Vec<Address>, GeocodeError> {
        Err(GeocodeError::Status {
            status: "REQUEST_DENIED".to_string(),
            message: "no geocoder API key configured".to_string(),
        })
    }
}
