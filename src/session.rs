//! Session state machine
//!
//! One session is one attempt from location request through tour or
//! failure:
//!
//! ```text
//! AwaitingLocation -> LocationFailed
//!                  -> LocationAcquired -> FetchingTour -> TourReady
//!                                                      -> TourFailed
//! ```
//!
//! Terminal states are never left. Retrying means starting a new
//! [`Session`].

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::config::TourGuideConfig;
use crate::location::{LocationAcquirer, LocationFailure};
use crate::models::{Coordinate, Tour};
use crate::tour::{TourFailure, TourResult, TourSource};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    AwaitingLocation,
    LocationFailed(LocationFailure),
    LocationAcquired(Coordinate),
    FetchingTour(Coordinate),
    TourReady { coordinate: Coordinate, tour: Tour },
    TourFailed {
        coordinate: Coordinate,
        failure: TourFailure,
    },
}

impl SessionState {
    /// Stable identifier used on the wire and in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingLocation => "awaiting_location",
            SessionState::LocationFailed(_) => "location_failed",
            SessionState::LocationAcquired(_) => "location_acquired",
            SessionState::FetchingTour(_) => "fetching_tour",
            SessionState::TourReady { .. } => "tour_ready",
            SessionState::TourFailed { .. } => "tour_failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::LocationFailed(_)
                | SessionState::TourReady { .. }
                | SessionState::TourFailed { .. }
        )
    }

    #[must_use]
    pub fn coordinate(&self) -> Option<&Coordinate> {
        match self {
            SessionState::AwaitingLocation | SessionState::LocationFailed(_) => None,
            SessionState::LocationAcquired(coordinate)
            | SessionState::FetchingTour(coordinate)
            | SessionState::TourReady { coordinate, .. }
            | SessionState::TourFailed { coordinate, .. } => Some(coordinate),
        }
    }

    #[must_use]
    pub fn tour(&self) -> Option<&Tour> {
        match self {
            SessionState::TourReady { tour, .. } => Some(tour),
            _ => None,
        }
    }

    /// Message to show the visitor for this state
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SessionState::AwaitingLocation => "Waiting for your location...".to_string(),
            SessionState::LocationFailed(failure) => failure.user_message(),
            SessionState::LocationAcquired(coordinate) => {
                format!("Found you at {}.", coordinate.format_coordinates())
            }
            SessionState::FetchingTour(coordinate) => format!(
                "Preparing a historical tour for {}...",
                coordinate.format_coordinates()
            ),
            SessionState::TourReady { tour, .. } => tour.text.clone(),
            SessionState::TourFailed { failure, .. } => failure.user_message(),
        }
    }
}

/// Bounded waits applied by [`Session::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub location_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&TourGuideConfig::default())
    }
}

impl From<&TourGuideConfig> for SessionLimits {
    fn from(config: &TourGuideConfig) -> Self {
        Self {
            location_timeout: config.location.timeout(),
            // Outer bound; the HTTP client's own timeout fires first.
            fetch_timeout: config.llm.timeout() + Duration::from_secs(5),
        }
    }
}

/// Owned state of one visitor interaction
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingLocation,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> SessionState {
        self.state
    }

    /// Record the acquirer's outcome. Only the first outcome counts;
    /// returns whether this call changed the state.
    pub fn record_location(&mut self, outcome: Result<Coordinate, LocationFailure>) -> bool {
        if self.state != SessionState::AwaitingLocation {
            debug!(
                state = self.state.name(),
                "Ignoring location outcome outside awaiting_location"
            );
            return false;
        }

        self.state = match outcome {
            Ok(coordinate) => {
                info!("Location acquired: {}", coordinate.format_coordinates());
                SessionState::LocationAcquired(coordinate)
            }
            Err(failure) => {
                warn!("Location failed: {}", failure);
                SessionState::LocationFailed(failure)
            }
        };
        true
    }

    /// Move to `FetchingTour`, handing out the coordinate to fetch for.
    /// Yields `Some` at most once per session.
    pub fn begin_fetch(&mut self) -> Option<Coordinate> {
        match self.state {
            SessionState::LocationAcquired(coordinate) => {
                self.state = SessionState::FetchingTour(coordinate);
                Some(coordinate)
            }
            _ => {
                debug!(state = self.state.name(), "Not starting a second fetch");
                None
            }
        }
    }

    /// Record the fetch outcome; only acts while `FetchingTour`
    pub fn record_tour(&mut self, result: TourResult) -> bool {
        let SessionState::FetchingTour(coordinate) = self.state else {
            debug!(
                state = self.state.name(),
                "Ignoring tour result outside fetching_tour"
            );
            return false;
        };

        self.state = match result {
            Ok(tour) => {
                info!("Tour ready ({} characters)", tour.text.len());
                SessionState::TourReady { coordinate, tour }
            }
            Err(failure) => {
                warn!("Tour failed: {}", failure);
                SessionState::TourFailed {
                    coordinate,
                    failure,
                }
            }
        };
        true
    }

    /// Drive the session to a terminal state
    ///
    /// Each suspension point is bounded: an acquisition that outlives
    /// `location_timeout` becomes [`LocationFailure::Timeout`], a fetch that
    /// outlives `fetch_timeout` becomes [`TourFailure::Transport`].
    #[instrument(skip_all)]
    pub async fn run(
        &mut self,
        acquirer: &dyn LocationAcquirer,
        source: &dyn TourSource,
        limits: &SessionLimits,
    ) -> &SessionState {
        if self.state == SessionState::AwaitingLocation {
            let outcome = timeout(limits.location_timeout, acquirer.acquire())
                .await
                .unwrap_or(Err(LocationFailure::Timeout));
            self.record_location(outcome);
        }

        if let Some(coordinate) = self.begin_fetch() {
            let result = timeout(limits.fetch_timeout, source.fetch(&coordinate))
                .await
                .unwrap_or_else(|_| {
                    Err(TourFailure::Transport(format!(
                        "No response within {}s",
                        limits.fetch_timeout.as_secs()
                    )))
                });
            self.record_tour(result);
        }

        &self.state
    }
}
