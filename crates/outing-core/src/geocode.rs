use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_SUFFIX: &str = "Glasgow, UK";

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned an unusable coordinate: {0}")]
    BadCoordinate(String),
}

/// Free-text place search returning the single best match, if any.
pub trait Geocoder {
    fn search(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError>;
}

/// Appends the fixed locality to the user's text.
pub fn localized_query(query: &str, suffix: &str) -> String {
    let suffix = suffix.trim();
    if suffix.is_empty() {
        query.to_string()
    } else {
        format!("{query}, {suffix}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

/// Hands out increasing tokens; only the newest one is current, so a slow
/// response to an older search can be recognised and dropped.
#[derive(Debug, Default)]
pub struct TokenIssuer {
    latest: u64,
}

impl TokenIssuer {
    pub fn issue(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("outing/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build geocoding http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    fn search(&self, query: &str) -> Result<Option<GeocodeHit>, GeocodeError> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("q", query), ("limit", "1")])
            .send()?
            .error_for_status()?
            .json()?;

        let Some(place) = places.into_iter().next() else {
            debug!("geocoder returned no match");
            return Ok(None);
        };
        Ok(Some(place_to_hit(place)?))
    }
}

fn place_to_hit(place: NominatimPlace) -> Result<GeocodeHit, GeocodeError> {
    let parse = |raw: &str| {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                warn!(value = raw, "unparseable coordinate from geocoder");
                GeocodeError::BadCoordinate(raw.to_string())
            })
    };
    Ok(GeocodeHit {
        lat: parse(&place.lat)?,
        lng: parse(&place.lon)?,
        display_name: place.display_name,
    })
}
