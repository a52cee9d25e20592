//! Geo-discovery client for solar installer candidates
//!
//! Queries an Overpass-style open geographic data service for entities whose
//! tags indicate solar-related business activity within a radius of a point.
//! The upstream tag schema is loosely typed and wildly inconsistent; it is
//! modeled here as an explicit optional-field struct and resolved into
//! [`InstallerCandidate`] records once, at this boundary, so the rest of the
//! pipeline never sees raw tags.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DiscoveryConfig;
use crate::installer::{normalize_name, same_location, InstallerCandidate};
use crate::rate_limit::{service, RateLimiter};

/// Hard fair-use cap on the query radius. Radii above this fail before any
/// network call; the upstream service's usage policy is not negotiable from
/// a batch tool.
pub const MAX_RADIUS_METERS: u32 = 50_000;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("radius {requested} m exceeds the fair-use cap of {MAX_RADIUS_METERS} m")]
    RadiusExceedsCap { requested: u32 },

    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("discovery service returned HTTP status {0}")]
    Status(u16),

    #[error("unparseable discovery response: {0}")]
    Body(String),
}

/// Raw Overpass response envelope.
#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OsmElement>,
}

/// One element from the discovery source. Nodes carry `lat`/`lon` directly;
/// ways and relations only carry a `center` when the query asks for one.
#[derive(Debug, Deserialize)]
pub struct OsmElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub center: Option<OsmCenter>,
    #[serde(default)]
    pub tags: Option<OsmTags>,
}

#[derive(Debug, Deserialize)]
pub struct OsmCenter {
    pub lat: f64,
    pub lon: f64,
}

/// The subset of upstream tags this pipeline reads, all optional.
///
/// Fallback rules applied during normalization:
/// - name falls back to operator, then brand; the display name is split on
///   a comma and the first segment kept
/// - phone falls back to `contact:phone`, website to `contact:website`
/// - the founding year is the leading year of `start_date`
#[derive(Debug, Default, Deserialize)]
pub struct OsmTags {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(rename = "addr:housenumber", default)]
    pub housenumber: Option<String>,
    #[serde(rename = "addr:street", default)]
    pub street: Option<String>,
    #[serde(rename = "addr:city", default)]
    pub city: Option<String>,
    #[serde(rename = "addr:state", default)]
    pub state: Option<String>,
    #[serde(rename = "addr:postcode", default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(rename = "contact:phone", default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(rename = "contact:website", default)]
    pub contact_website: Option<String>,
    #[serde(rename = "start_date", default)]
    pub start_date: Option<String>,
}

pub struct DiscoveryClient {
    endpoint: String,
    client: reqwest::Client,
    query_timeout_secs: u64,
}

impl DiscoveryClient {
    pub fn from_config(config: &DiscoveryConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(user_agent.to_string())
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
            query_timeout_secs: config.request_timeout_secs,
        })
    }

    /// Discover installer candidates within `radius_m` of a point.
    ///
    /// Validates the radius before touching the network, acquires the
    /// discovery rate-limit slot, and returns normalized, deduplicated
    /// candidates. Any transport or non-2xx failure is fatal for the run.
    pub async fn search(
        &self,
        limiter: &mut RateLimiter,
        lat: f64,
        lon: f64,
        radius_m: u32,
    ) -> Result<Vec<InstallerCandidate>, DiscoveryError> {
        if radius_m > MAX_RADIUS_METERS {
            return Err(DiscoveryError::RadiusExceedsCap { requested: radius_m });
        }

        limiter.acquire(service::DISCOVERY).await;

        let query = build_query(lat, lon, radius_m, self.query_timeout_secs);
        debug!("Discovery query:\n{}", query);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status(status.as_u16()));
        }

        let body: OverpassResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Body(e.to_string()))?;

        let raw_count = body.elements.len();
        let candidates: Vec<InstallerCandidate> = body
            .elements
            .iter()
            .filter_map(candidate_from_element)
            .collect();
        let candidates = dedup_candidates(candidates);

        info!(
            "Discovery returned {} elements, {} usable candidates after normalization and dedup",
            raw_count,
            candidates.len()
        );
        Ok(candidates)
    }
}

/// Build the Overpass QL query. Several independent tag predicates are
/// unioned - an entity matches if ANY clause matches, mirroring the breadth
/// of tagging styles in the wild: plain "solar" names, solar crafts/trades,
/// and energy offices or shops branded solar.
pub fn build_query(lat: f64, lon: f64, radius_m: u32, timeout_secs: u64) -> String {
    let around = format!("(around:{},{:.6},{:.6})", radius_m, lat, lon);
    format!(
        "[out:json][timeout:{timeout}];\n(\n  nwr[\"name\"~\"solar\",i]{around};\n  nwr[\"craft\"~\"solar\",i]{around};\n  nwr[\"trade\"~\"solar\",i]{around};\n  nwr[\"office\"=\"energy_supplier\"][\"name\"~\"solar\",i]{around};\n  nwr[\"shop\"=\"energy\"][\"name\"~\"solar\",i]{around};\n);\nout center;\n",
        timeout = timeout_secs,
        around = around,
    )
}

/// Resolve one raw element into a candidate. Elements without a usable name
/// or without any resolvable coordinate are dropped.
pub fn candidate_from_element(element: &OsmElement) -> Option<InstallerCandidate> {
    let tags = element.tags.as_ref()?;

    let raw_name = tags
        .name
        .as_deref()
        .or(tags.operator.as_deref())
        .or(tags.brand.as_deref())?;
    // Display names like "Sunrise Solar, Roofing & Electrical" keep the
    // leading segment only.
    let name = raw_name.split(',').next().unwrap_or(raw_name).trim();
    if name.is_empty() {
        return None;
    }

    let (lat, lon) = match (element.lat, element.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            let center = element.center.as_ref()?;
            (center.lat, center.lon)
        }
    };

    let street = match (tags.housenumber.as_deref(), tags.street.as_deref()) {
        (Some(number), Some(street)) => Some(format!("{} {}", number, street)),
        (None, Some(street)) => Some(street.to_string()),
        _ => None,
    };

    Some(InstallerCandidate {
        source_id: Some(format!("{}/{}", element.kind, element.id)),
        name: name.to_string(),
        lat,
        lon,
        street,
        city: tags.city.clone(),
        state: tags.state.clone(),
        postcode: tags.postcode.clone(),
        phone: tags.phone.clone().or_else(|| tags.contact_phone.clone()),
        website: tags.website.clone().or_else(|| tags.contact_website.clone()),
        founded_year: parse_founded_year(tags.start_date.as_deref()),
    })
}

/// Parse the leading year out of a `start_date` tag ("2012", "2012-06", ...).
fn parse_founded_year(start_date: Option<&str>) -> Option<i32> {
    let raw = start_date?.trim();
    let year: i32 = raw.get(..4)?.parse().ok()?;
    (1800..=2100).contains(&year).then_some(year)
}

/// Drop near-duplicate candidates: same case-insensitive name and coordinates
/// within tolerance. The first occurrence wins.
pub fn dedup_candidates(candidates: Vec<InstallerCandidate>) -> Vec<InstallerCandidate> {
    let mut kept: Vec<InstallerCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = kept.iter().any(|existing| {
            normalize_name(&existing.name) == normalize_name(&candidate.name)
                && same_location(existing.lat, existing.lon, candidate.lat, candidate.lon)
        });
        if duplicate {
            debug!("Dropping duplicate discovery candidate '{}'", candidate.name);
        } else {
            kept.push(candidate);
        }
    }
    kept
}
