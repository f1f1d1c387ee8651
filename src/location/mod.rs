//! Location acquisition
//!
//! A [`LocationAcquirer`] asks the host environment for the device position
//! and yields either a validated [`Coordinate`] or a [`LocationFailure`].
//! Acquirers never retry; whoever drives the session decides whether to
//! ask again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::Coordinate;

pub mod ip;
pub mod permission;

pub use ip::IpLocation;
pub use permission::{AlwaysAllow, PermissionGate, PermissionPrompt, TerminalPrompt};

/// Why no coordinate could be obtained
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationFailure {
    /// The host has no location capability
    #[error("location capability is not supported")]
    Unsupported,
    /// The user refused access to their location
    #[error("location permission denied")]
    PermissionDenied,
    /// No answer within the allowed time
    #[error("timed out waiting for a location fix")]
    Timeout,
    /// Capability present and permitted, but no fix was obtained
    #[error("location unavailable")]
    Unavailable,
}

impl LocationFailure {
    /// Stable identifier used on the wire
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            LocationFailure::Unsupported => "unsupported",
            LocationFailure::PermissionDenied => "permission_denied",
            LocationFailure::Timeout => "timeout",
            LocationFailure::Unavailable => "unavailable",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            LocationFailure::Unsupported => {
                "Location is not supported on this device.".to_string()
            }
            LocationFailure::PermissionDenied => {
                "Location access was denied. Allow location access and try again.".to_string()
            }
            LocationFailure::Timeout => {
                "Finding your location took too long. Please try again.".to_string()
            }
            LocationFailure::Unavailable => {
                "Your location could not be determined right now. Please try again.".to_string()
            }
        }
    }
}

/// Source of the device position
#[async_trait]
pub trait LocationAcquirer: Send + Sync {
    async fn acquire(&self) -> Result<Coordinate, LocationFailure>;
}

/// Always yields the same coordinate
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coordinate: Coordinate,
}

impl FixedLocation {
    #[must_use]
    pub fn new(coordinate: Coordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl LocationAcquirer for FixedLocation {
    async fn acquire(&self) -> Result<Coordinate, LocationFailure> {
        Ok(self.coordinate)
    }
}

/// A host without any location capability
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationAcquirer for NoLocation {
    async fn acquire(&self) -> Result<Coordinate, LocationFailure> {
        Err(LocationFailure::Unsupported)
    }
}

/// Error kinds a browser reports for a failed geolocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedError {
    PermissionDenied,
    Unavailable,
    Timeout,
    Unsupported,
}

/// What a browser page sends after calling its geolocation API
///
/// Accepts the position, a named error, or the numeric
/// `GeolocationPositionError.code` (1 denied, 2 unavailable, 3 timeout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeolocationReport {
    Position { latitude: f64, longitude: f64 },
    Error { error: ReportedError },
    ErrorCode { error_code: u16 },
}

/// Replays a position (or failure) the browser already obtained
#[derive(Debug, Clone)]
pub struct ReportedLocation {
    report: GeolocationReport,
}

impl ReportedLocation {
    #[must_use]
    pub fn new(report: GeolocationReport) -> Self {
        Self { report }
    }
}

#[async_trait]
impl LocationAcquirer for ReportedLocation {
    async fn acquire(&self) -> Result<Coordinate, LocationFailure> {
        match &self.report {
            GeolocationReport::Position {
                latitude,
                longitude,
            } => Coordinate::new(*latitude, *longitude).map_err(|e| {
                debug!("Browser reported an invalid position: {}", e);
                LocationFailure::Unavailable
            }),
            GeolocationReport::Error { error } => Err(match error {
                ReportedError::PermissionDenied => LocationFailure::PermissionDenied,
                ReportedError::Unavailable => LocationFailure::Unavailable,
                ReportedError::Timeout => LocationFailure::Timeout,
                ReportedError::Unsupported => LocationFailure::Unsupported,
            }),
            GeolocationReport::ErrorCode { error_code } => Err(match error_code {
                1 => LocationFailure::PermissionDenied,
                3 => LocationFailure::Timeout,
                _ => LocationFailure::Unavailable,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn test_fixed_location() {
        let coordinate = Coordinate::new(46.8182, 8.2275).unwrap();
        let acquirer = FixedLocation::new(coordinate);
        assert_eq!(acquirer.acquire().await, Ok(coordinate));
    }

    #[tokio::test]
    async fn test_no_location_is_unsupported() {
        assert_eq!(NoLocation.acquire().await, Err(LocationFailure::Unsupported));
    }

    #[rstest]
    #[case(r#"{"error": "permission_denied"}"#, LocationFailure::PermissionDenied)]
    #[case(r#"{"error": "unavailable"}"#, LocationFailure::Unavailable)]
    #[case(r#"{"error": "timeout"}"#, LocationFailure::Timeout)]
    #[case(r#"{"error": "unsupported"}"#, LocationFailure::Unsupported)]
    #[case(r#"{"error_code": 1}"#, LocationFailure::PermissionDenied)]
    #[case(r#"{"error_code": 2}"#, LocationFailure::Unavailable)]
    #[case(r#"{"error_code": 3}"#, LocationFailure::Timeout)]
    #[case(r#"{"latitude": 91.0, "longitude": 0.0}"#, LocationFailure::Unavailable)]
    #[tokio::test]
    async fn test_reported_failures(#[case] body: &str, #[case] expected: LocationFailure) {
        let report: GeolocationReport = serde_json::from_str(body).unwrap();
        let result = ReportedLocation::new(report).acquire().await;
        assert_eq!(result, Err(expected));
    }

    #[tokio::test]
    async fn test_reported_position() {
        let report: GeolocationReport =
            serde_json::from_str(r#"{"latitude": 40.689247, "longitude": -74.044502}"#).unwrap();
        let coordinate = ReportedLocation::new(report).acquire().await.unwrap();
        assert_eq!(coordinate.latitude(), 40.689247);
        assert_eq!(coordinate.longitude(), -74.044502);
    }

    #[test]
    fn test_failure_codes_and_messages() {
        assert_eq!(LocationFailure::PermissionDenied.code(), "permission_denied");
        assert!(
            LocationFailure::PermissionDenied
                .user_message()
                .contains("denied")
        );
        assert!(LocationFailure::Timeout.user_message().contains("too long"));
    }
}
