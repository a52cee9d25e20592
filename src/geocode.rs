//! Geocoding client
//!
//! Thin wrapper over a Nominatim-compatible endpoint, used once per run when
//! the run is keyed by a location string rather than raw coordinates. The
//! endpoint is configurable so tests can point it at a local mock server.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::GeocodingConfig;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoding service returned HTTP status {0}")]
    Status(u16),

    #[error("unparseable geocoding response: {0}")]
    Body(String),
}

/// Nominatim search result (partial). Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub struct GeocodeClient {
    endpoint: String,
    client: reqwest::Client,
}

impl GeocodeClient {
    pub fn from_config(config: &GeocodingConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(user_agent.to_string())
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Resolve a free-text location to coordinates. `Ok(None)` means the
    /// service answered but found nothing.
    pub async fn resolve(&self, query: &str) -> Result<Option<(f64, f64)>, GeocodeError> {
        let url = format!("{}/search", self.endpoint);
        debug!("Geocoding '{}' via {}", query, url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Body(e.to_string()))?;

        let Some(place) = places.into_iter().next() else {
            debug!("Geocoding found no match for '{}'", query);
            return Ok(None);
        };

        let lat: f64 = place
            .lat
            .parse()
            .map_err(|_| GeocodeError::Body(format!("bad latitude '{}'", place.lat)))?;
        let lon: f64 = place
            .lon
            .parse()
            .map_err(|_| GeocodeError::Body(format!("bad longitude '{}'", place.lon)))?;

        debug!("Geocoded '{}' to ({}, {})", query, lat, lon);
        Ok(Some((lat, lon)))
    }
}
