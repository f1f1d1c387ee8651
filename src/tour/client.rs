//! Chat-completion client for OpenAI-compatible endpoints
//!
//! Sends one request per fetch and classifies the outcome into the
//! [`TourFailure`] taxonomy. No retries happen here.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use super::request::{TourSettings, build_request};
use super::{TourFailure, TourResult, TourSource};
use crate::TourGuideError;
use crate::config::LlmConfig;
use crate::models::{Coordinate, Tour};

/// Upper bound on how much of an error body is kept
const MAX_ERROR_BODY: usize = 2048;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completion API client
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    settings: TourSettings,
}

impl std::fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionClient {
    /// Create a client from configuration; a missing credential is a
    /// configuration error
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Self::new(&config.base_url, api_key, config.into(), config.timeout())
    }

    /// Create a new client against `{base_url}/chat/completions`
    pub fn new(
        base_url: &str,
        api_key: &str,
        settings: TourSettings,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TourGuideError::config("API key cannot be empty").into());
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("TourGuide/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.trim().to_string(),
            settings,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &TourSettings {
        &self.settings
    }
}

#[async_trait]
impl TourSource for ChatCompletionClient {
    #[instrument(skip(self, coordinate), fields(coordinate = %coordinate))]
    async fn fetch(&self, coordinate: &Coordinate) -> TourResult {
        let request = build_request(coordinate, &self.settings);
        let start_time = Instant::now();

        debug!("Requesting tour from {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Tour request failed: {}", e);
                TourFailure::Transport(format!("Tour request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!("Failed to read tour response body: {}", e);
            TourFailure::Transport(format!("Failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        let text = extract_text(&body)?;

        let duration = start_time.elapsed();
        info!(
            "Received tour of {} characters in {:.3}s",
            text.len(),
            duration.as_secs_f64()
        );
        if duration.as_secs() > 15 {
            warn!("Slow tour response: {:.3}s", duration.as_secs_f64());
        }

        Ok(Tour::new(&text, &self.settings.model))
    }
}

fn classify_status(status: StatusCode, body: String) -> TourFailure {
    let body = truncate(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("Tour service authentication failed (HTTP {})", status.as_u16());
            TourFailure::Auth(format!("HTTP {}: {}", status.as_u16(), body))
        }
        _ => {
            warn!("Tour service returned HTTP {}", status.as_u16());
            TourFailure::Upstream {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Pull the first candidate's text out of a success body
fn extract_text(body: &str) -> Result<String, TourFailure> {
    let response: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse tour response: {}", e);
        TourFailure::MalformedResponse(format!("Invalid JSON: {e}"))
    })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| {
            TourFailure::MalformedResponse("Response has no choices[0].message.content".into())
        })?;

    let text = content.trim();
    if text.is_empty() {
        return Err(TourFailure::MalformedResponse(
            "Response message is empty".into(),
        ));
    }

    Ok(text.to_string())
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
