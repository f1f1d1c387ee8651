//! Speech playback capability
//!
//! The session never talks to a speech engine directly. A finished tour's
//! text is handed to a [`Speaker`], which the host environment provides.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SpeechConfig;

/// Reads text aloud
pub trait Speaker: Send + Sync {
    /// Start reading `text`, replacing anything queued before
    fn speak(&self, text: &str) -> Result<()>;
    fn pause(&self);
    fn resume(&self);
}

/// Speaker for hosts without speech output
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        debug!("Speech disabled, skipping {} characters", text.len());
        Ok(())
    }

    fn pause(&self) {}

    fn resume(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Playing,
    Paused,
}

/// Speaks through an external text-to-speech program, one sentence per
/// invocation
///
/// Pausing stops the running program. Resuming replays the interrupted
/// sentence from its start.
pub struct CommandSpeaker {
    command: String,
    args: Vec<String>,
    control: Arc<watch::Sender<Playback>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandSpeaker {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        let (control, _) = watch::channel(Playback::Playing);
        Self {
            command: command.into(),
            args,
            control: Arc::new(control),
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// Wait until the current text has been read completely
    pub async fn wait(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Speech task failed: {}", e);
                }
            }
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.control.borrow() == Playback::Paused
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, text: &str) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| anyhow!("Speech playback requires a Tokio runtime"))?;

        let sentences = split_sentences(text);
        info!("Speaking {} sentences with '{}'", sentences.len(), self.command);

        self.control.send_replace(Playback::Playing);
        let handle = runtime.spawn(play(
            self.command.clone(),
            self.args.clone(),
            sentences,
            self.control.subscribe(),
        ));

        let previous = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    fn pause(&self) {
        debug!("Pausing speech");
        self.control.send_replace(Playback::Paused);
    }

    fn resume(&self) {
        debug!("Resuming speech");
        self.control.send_replace(Playback::Playing);
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        if let Some(handle) = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

async fn play(
    command: String,
    args: Vec<String>,
    sentences: Vec<String>,
    mut control: watch::Receiver<Playback>,
) {
    let mut index = 0;

    while index < sentences.len() {
        let state = *control.borrow_and_update();
        if state == Playback::Paused {
            if control.changed().await.is_err() {
                return;
            }
            continue;
        }

        let mut child = match Command::new(&command)
            .args(&args)
            .arg(&sentences[index])
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start speech program '{}': {}", command, e);
                return;
            }
        };

        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if !status.success() => {
                        warn!("Speech program exited with {}", status);
                    }
                    Err(e) => warn!("Speech program failed: {}", e),
                    Ok(_) => {}
                }
                index += 1;
            }
            changed = control.changed() => {
                if let Err(e) = child.kill().await {
                    debug!("Speech program already gone: {}", e);
                }
                if changed.is_err() {
                    return;
                }
            }
        }
    }

    debug!("Finished speaking");
}

/// Split text into sentences on `.`, `!` and `?` followed by whitespace
#[must_use]
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|next| next.is_whitespace());
        if at_boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}
