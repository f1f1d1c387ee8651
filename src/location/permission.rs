//! Host-level permission prompt in front of a location acquirer
//!
//! The user is asked once per process. The answer is remembered, so
//! later acquisitions neither prompt again nor change the outcome.

use std::io::{BufRead, Write};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{LocationAcquirer, LocationFailure};
use crate::models::Coordinate;

/// Asks the user whether their location may be used
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn request(&self) -> bool;
}

/// Grants permission without asking, for non-interactive runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

#[async_trait]
impl PermissionPrompt for AlwaysAllow {
    async fn request(&self) -> bool {
        true
    }
}

/// Asks on the terminal; anything but "y"/"yes" is a denial
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl PermissionPrompt for TerminalPrompt {
    async fn request(&self) -> bool {
        let answer = tokio::task::spawn_blocking(|| {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "Allow tourguide to look up your approximate location? [y/N] ");
            let _ = stderr.flush();

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(e)) => {
                warn!("Failed to read permission answer: {}", e);
                false
            }
            Err(e) => {
                warn!("Permission prompt task failed: {}", e);
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Wraps an acquirer so the first acquisition asks for permission
pub struct PermissionGate<A> {
    inner: A,
    prompt: Box<dyn PermissionPrompt>,
    decision: OnceCell<bool>,
}

impl<A: LocationAcquirer> PermissionGate<A> {
    pub fn new(inner: A, prompt: impl PermissionPrompt + 'static) -> Self {
        Self {
            inner,
            prompt: Box::new(prompt),
            decision: OnceCell::new(),
        }
    }

    /// The remembered answer, if the user has been asked
    #[must_use]
    pub fn decision(&self) -> Option<bool> {
        self.decision.get().copied()
    }
}

#[async_trait]
impl<A: LocationAcquirer> LocationAcquirer for PermissionGate<A> {
    async fn acquire(&self) -> Result<Coordinate, LocationFailure> {
        let allowed = *self
            .decision
            .get_or_init(|| async {
                let allowed = self.prompt.request().await;
                info!(allowed, "Location permission decided");
                allowed
            })
            .await;

        if !allowed {
            debug!("Location permission previously denied");
            return Err(LocationFailure::PermissionDenied);
        }

        self.inner.acquire().await
    }
}
