//! Approximate device location from an IP-geolocation service
//!
//! Speaks the `ip-api.com` JSON shape:
//! `{"status": "success", "lat": .., "lon": ..}` or
//! `{"status": "fail", "message": ".."}`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{LocationAcquirer, LocationFailure};
use crate::models::Coordinate;

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

/// IP-geolocation client
pub struct IpLocation {
    client: Client,
    lookup_url: String,
}

impl IpLocation {
    /// Create a new client
    pub fn new(lookup_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("TourGuide/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            lookup_url: lookup_url.into(),
        })
    }
}

#[async_trait]
impl LocationAcquirer for IpLocation {
    #[instrument(skip(self))]
    async fn acquire(&self) -> Result<Coordinate, LocationFailure> {
        let response = self
            .client
            .get(&self.lookup_url)
            .send()
            .await
            .map_err(|e| {
                warn!("IP location lookup failed: {}", e);
                if e.is_timeout() {
                    LocationFailure::Timeout
                } else {
                    LocationFailure::Unavailable
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("IP location lookup returned HTTP {}", status);
            return Err(LocationFailure::Unavailable);
        }

        let lookup: IpLookupResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                return LocationFailure::Timeout;
            }
            warn!("Failed to parse IP location response: {}", e);
            LocationFailure::Unavailable
        })?;

        if lookup.status != "success" {
            warn!(
                "IP location lookup reported '{}': {}",
                lookup.status,
                lookup.message.as_deref().unwrap_or("no message")
            );
            return Err(LocationFailure::Unavailable);
        }

        let (Some(lat), Some(lon)) = (lookup.lat, lookup.lon) else {
            warn!("IP location response is missing coordinates");
            return Err(LocationFailure::Unavailable);
        };

        let coordinate = Coordinate::new(lat, lon).map_err(|e| {
            warn!("IP location service returned {}", e);
            LocationFailure::Unavailable
        })?;

        debug!("Approximate location: {}", coordinate.format_coordinates());
        Ok(coordinate)
    }
}
