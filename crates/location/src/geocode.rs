//! Postal-code lookup against a free-text geocoding service.
//!
//! A lookup is a single request for at most one candidate. There is no cache
//! and no retry; the caller decides what to do with each [`Resolution`].

use std::future::Future;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LocationConfig;
use crate::coordinate::{LatLng, parse_coordinate_text};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoder responded with HTTP {0}")]
    Status(u16),
    #[error("geocoder returned an unusable candidate: {0}")]
    Parse(String),
}

/// A postal code scoped to the configured country.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeocodeQuery {
    postal_code: String,
    country: String,
}

impl GeocodeQuery {
    /// `None` when the postal code is blank.
    pub fn new(postal_code: &str, country: &str) -> Option<Self> {
        let postal_code = postal_code.trim();
        if postal_code.is_empty() {
            return None;
        }
        Some(Self {
            postal_code: postal_code.to_string(),
            country: country.to_string(),
        })
    }

    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    /// Free-text `q` parameter, e.g. `110001,India`.
    pub fn search_text(&self) -> String {
        if self.country.is_empty() {
            self.postal_code.clone()
        } else {
            format!("{},{}", self.postal_code, self.country)
        }
    }
}

/// One entry of the service's JSON array.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GeocodeCandidate {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Candidate whose coordinates parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodedPoint {
    /// Latitude exactly as the service spelled it.
    pub lat_text: String,
    pub lng_text: String,
    pub position: LatLng,
    pub display_name: Option<String>,
}

impl TryFrom<GeocodeCandidate> for GeocodedPoint {
    type Error = GeocodeError;

    fn try_from(candidate: GeocodeCandidate) -> Result<Self, Self::Error> {
        let position = LatLng::new(
            parse_coordinate_text(&candidate.lat),
            parse_coordinate_text(&candidate.lon),
        );
        if !position.is_valid() {
            return Err(GeocodeError::Parse(format!(
                "lat={:?} lon={:?}",
                candidate.lat, candidate.lon
            )));
        }
        Ok(Self {
            lat_text: candidate.lat,
            lng_text: candidate.lon,
            position,
            display_name: candidate.display_name,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Blank query; nothing was sent.
    Skipped,
    Found(GeocodedPoint),
    NotFound,
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Skipped => "skipped",
            Resolution::Found(_) => "found",
            Resolution::NotFound => "not_found",
        }
    }
}

/// Backend that turns a query into raw candidates.
pub trait GeocodeProvider {
    fn search(
        &self,
        query: &GeocodeQuery,
    ) -> impl Future<Output = Result<Vec<GeocodeCandidate>, GeocodeError>> + Send;
}

/// Nominatim-compatible search endpoint.
#[derive(Clone, Debug)]
pub struct NominatimClient {
    client: Client,
    endpoint: String,
}

impl NominatimClient {
    pub fn new(config: &LocationConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.geocoder_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GeocodeProvider for NominatimClient {
    async fn search(&self, query: &GeocodeQuery) -> Result<Vec<GeocodeCandidate>, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query.search_text().as_str()),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| GeocodeError::Parse(err.to_string()))
    }
}

/// Resolves postal codes for one country through a provider.
#[derive(Clone, Debug)]
pub struct Resolver<P> {
    provider: P,
    country: String,
}

impl<P: GeocodeProvider> Resolver<P> {
    pub fn new(provider: P, country: impl Into<String>) -> Self {
        Self {
            provider,
            country: country.into(),
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Look up `postal_code`. Blank input returns [`Resolution::Skipped`]
    /// without touching the provider.
    pub async fn resolve(&self, postal_code: &str) -> Result<Resolution, GeocodeError> {
        let Some(query) = GeocodeQuery::new(postal_code, &self.country) else {
            return Ok(Resolution::Skipped);
        };

        let outcome = match self.provider.search(&query).await {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(candidate) => GeocodedPoint::try_from(candidate).map(Resolution::Found),
                None => Ok(Resolution::NotFound),
            },
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(resolution) => {
                metrics::counter!("snapfix_geocode_requests_total", "outcome" => resolution.label())
                    .increment(1);
                debug!(
                    postal_code = query.postal_code(),
                    outcome = resolution.label(),
                    "geocode lookup finished"
                );
            }
            Err(err) => {
                metrics::counter!("snapfix_geocode_requests_total", "outcome" => "error")
                    .increment(1);
                warn!(postal_code = query.postal_code(), "geocode lookup failed: {err}");
            }
        }
        outcome
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{TableProvider, candidate};
    use super::*;

    #[test]
    fn query_trims_and_rejects_blank_input() {
        assert_eq!(GeocodeQuery::new("   ", "India"), None);
        let query = GeocodeQuery::new(" 110001 ", "India").unwrap();
        assert_eq!(query.postal_code(), "110001");
        assert_eq!(query.search_text(), "110001,India");
        assert_eq!(GeocodeQuery::new("10115", "").unwrap().search_text(), "10115");
    }

    #[test]
    fn candidates_deserialize_from_service_json() {
        let body = r#"[{"place_id":1,"lat":"28.6448","lon":"77.2167","display_name":"New Delhi"}]"#;
        let parsed: Vec<GeocodeCandidate> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].lat, "28.6448");
        assert_eq!(parsed[0].display_name.as_deref(), Some("New Delhi"));
    }

    #[test]
    fn unparsable_candidate_is_an_error() {
        let err = GeocodedPoint::try_from(candidate("north", "77.2")).unwrap_err();
        assert!(matches!(err, GeocodeError::Parse(_)));
    }

    #[tokio::test]
    async fn found_keeps_service_text() {
        let provider = TableProvider::with(&[("110001", vec![candidate("28.6448", "77.2167")])]);
        let resolver = Resolver::new(provider, "India");
        let Resolution::Found(point) = resolver.resolve("110001").await.unwrap() else {
            panic!("expected a match");
        };
        assert_eq!(point.lat_text, "28.6448");
        assert_eq!(point.lng_text, "77.2167");
        assert_eq!(point.position, LatLng::new(28.6448, 77.2167));
    }

    #[tokio::test]
    async fn only_the_first_candidate_counts() {
        let provider = TableProvider::with(&[(
            "560001",
            vec![candidate("12.9716", "77.5946"), candidate("0", "0")],
        )]);
        let resolver = Resolver::new(provider, "India");
        let resolution = resolver.resolve("560001").await.unwrap();
        assert!(matches!(resolution, Resolution::Found(p) if p.lat_text == "12.9716"));
    }

    #[tokio::test]
    async fn empty_query_sends_nothing() {
        let resolver = Resolver::new(TableProvider::default(), "India");
        assert_eq!(resolver.resolve("").await.unwrap(), Resolution::Skipped);
        assert_eq!(resolver.resolve("  ").await.unwrap(), Resolution::Skipped);
        assert_eq!(resolver.provider().calls(), 0);
    }

    #[tokio::test]
    async fn zero_candidates_is_not_found() {
        let resolver = Resolver::new(TableProvider::default(), "India");
        assert_eq!(resolver.resolve("000000").await.unwrap(), Resolution::NotFound);
        assert_eq!(resolver.provider().calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let resolver = Resolver::new(TableProvider::failing(), "India");
        let err = resolver.resolve("110001").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status(503)));
    }

    #[test]
    fn nominatim_client_uses_configured_endpoint() {
        let config = LocationConfig {
            geocoder_url: "http://127.0.0.1:9/search".into(),
            ..LocationConfig::default()
        };
        let client = NominatimClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/search");
    }
}
