//! Tour model for generated narratives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generated historical tour for one coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    /// Narrative text, trimmed of surrounding whitespace
    pub text: String,
    /// Model that produced the narrative
    pub model: String,
    /// When the narrative was received
    pub generated_at: DateTime<Utc>,
}

impl Tour {
    /// Create a tour from raw model output, trimming surrounding whitespace
    #[must_use]
    pub fn new(text: &str, model: impl Into<String>) -> Self {
        Self {
            text: text.trim().to_string(),
            model: model.into(),
            generated_at: Utc::now(),
        }
    }
}
