//! Data models for the TourGuide application
//!
//! - Coordinate: validated geographic position
//! - Tour: generated narrative for a position

pub mod coordinate;
pub mod tour;

pub use coordinate::Coordinate;
pub use tour::Tour;
