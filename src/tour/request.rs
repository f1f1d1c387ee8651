//! Chat-completion request construction

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::models::Coordinate;

pub const SYSTEM_PROMPT: &str = "You are a highly knowledgeable historical tour guide.";

/// Generation parameters shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct TourSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for TourSettings {
    fn default() -> Self {
        LlmConfig::default().into()
    }
}

impl From<&LlmConfig> for TourSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl From<LlmConfig> for TourSettings {
    fn from(config: LlmConfig) -> Self {
        Self::from(&config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Request body for the chat completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Build the request for one coordinate
///
/// Latitude and longitude use `f64`'s shortest round-trip formatting, so
/// the numbers in the prompt parse back to exactly the input values.
#[must_use]
pub fn build_request(coordinate: &Coordinate, settings: &TourSettings) -> TourRequest {
    let prompt = format!(
        "You are a historical tour guide. Provide a rich, detailed historical tour for \
         the location at latitude {}, longitude {}. \
         Explain the historical significance of this place and the surrounding area.",
        coordinate.latitude(),
        coordinate.longitude()
    );

    TourRequest {
        model: settings.model.clone(),
        messages: vec![
            Message {
                role: Role::System,
                content: SYSTEM_PROMPT.to_string(),
            },
            Message {
                role: Role::User,
                content: prompt,
            },
        ],
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    }
}
