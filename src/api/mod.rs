use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;

use crate::{
    location::{GeolocationReport, ReportedLocation},
    session::{Session, SessionLimits, SessionState},
    tour::TourSource,
};

/// Shared, immutable state behind every request
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn TourSource>,
    pub limits: SessionLimits,
}

impl AppState {
    pub fn new(source: Arc<dyn TourSource>, limits: SessionLimits) -> Self {
        Self { source, limits }
    }
}

#[derive(Debug, Serialize)]
pub struct TourResponse {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&SessionState> for TourResponse {
    fn from(state: &SessionState) -> Self {
        let coordinate = state.coordinate();
        let (text, error, message) = match state {
            SessionState::TourReady { tour, .. } => (Some(tour.text.clone()), None, None),
            SessionState::LocationFailed(failure) => {
                (None, Some(failure.code()), Some(failure.user_message()))
            }
            SessionState::TourFailed { failure, .. } => {
                (None, Some(failure.code()), Some(failure.user_message()))
            }
            other => (None, None, Some(other.user_message())),
        };

        Self {
            state: state.name(),
            latitude: coordinate.map(|c| c.latitude()),
            longitude: coordinate.map(|c| c.longitude()),
            text,
            error,
            message,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tour", post(create_tour))
        .route("/health", get(health))
        .with_state(state)
}

async fn create_tour(
    State(state): State<AppState>,
    Json(report): Json<GeolocationReport>,
) -> (StatusCode, Json<TourResponse>) {
    let acquirer = ReportedLocation::new(report);
    let mut session = Session::new();
    let final_state = session
        .run(&acquirer, state.source.as_ref(), &state.limits)
        .await;

    let status = match final_state {
        SessionState::TourReady { .. } => StatusCode::OK,
        SessionState::LocationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionState::TourFailed { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status, Json(TourResponse::from(final_state)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}
