//! `TourGuide` - location-aware historical tours
//!
//! This library acquires the visitor's position, asks a chat-completion
//! model for a historical tour of that place, and hands the narrative to
//! a display or speech capability.

pub mod api;
pub mod config;
pub mod error;
pub mod location;
pub mod models;
pub mod session;
pub mod speech;
pub mod telemetry;
pub mod tour;
pub mod web;

// Re-export core types for public API
pub use config::TourGuideConfig;
pub use error::TourGuideError;
pub use location::{LocationAcquirer, LocationFailure};
pub use models::{Coordinate, Tour};
pub use session::{Session, SessionLimits, SessionState};
pub use speech::{CommandSpeaker, SilentSpeaker, Speaker};
pub use tour::{ChatCompletionClient, TourFailure, TourResult, TourSource, build_request};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
