//! Tour fetching
//!
//! A [`TourSource`] turns a coordinate into a narrative. Sources are
//! stateless and make exactly one attempt per call; at-most-once fetching
//! within a session is enforced by [`crate::session::Session`].

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Coordinate, Tour};

pub mod client;
pub mod request;

pub use client::ChatCompletionClient;
pub use request::{Message, Role, TourRequest, TourSettings, build_request};

/// Why no tour could be produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TourFailure {
    /// Credential missing or rejected by the endpoint
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Connection refused, DNS failure, timeout or a broken body
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Success status but the expected fields are missing
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl TourFailure {
    /// Stable identifier used on the wire
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            TourFailure::Auth(_) => "auth_error",
            TourFailure::Transport(_) => "transport_error",
            TourFailure::Upstream { .. } => "upstream_error",
            TourFailure::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TourFailure::Auth(_) => {
                "The tour service rejected our credentials. Please check the API key.".to_string()
            }
            TourFailure::Transport(_) => {
                "Unable to reach the tour service. Please check your internet connection."
                    .to_string()
            }
            TourFailure::Upstream { status, .. } => {
                format!("The tour service returned an error (HTTP {status}). Please try again later.")
            }
            TourFailure::MalformedResponse(_) => {
                "The tour service sent an unexpected answer. Please try again.".to_string()
            }
        }
    }
}

/// Outcome of one fetch
pub type TourResult = Result<Tour, TourFailure>;

/// Produces a historical tour for a coordinate
#[async_trait]
pub trait TourSource: Send + Sync {
    async fn fetch(&self, coordinate: &Coordinate) -> TourResult;
}
