//! Error types and handling for the `TourGuide` application
//!
//! Domain failures of a session (location, tour) live next to the code that
//! produces them. This module covers everything that stops the process or a
//! command before a session can start: configuration, input validation,
//! and server plumbing.

use thiserror::Error;

/// Main error type for the `TourGuide` application
#[derive(Error, Debug)]
pub enum TourGuideError {
    /// Configuration-related errors, including a missing credential
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// HTTP server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl TourGuideError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TourGuideError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file and API key.")
            }
            TourGuideError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            TourGuideError::Server { .. } => {
                "The tour server could not be started. Is the port already in use?".to_string()
            }
        }
    }
}
