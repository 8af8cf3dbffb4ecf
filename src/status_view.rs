//! Passive status label fed by the event relay.

use crate::analysis::parse_compound;
use crate::overlay::format_score;
use crate::relay::{EventRelay, Listener};
use tracing::{debug, warn};

/// Shown until the first analysis arrives
pub const PLACEHOLDER: &str = "reading…";

/// Label that shows the latest compound score published on a relay channel
pub struct StatusView {
    channel: String,
    listener: Option<Listener>,
    score: Option<f64>,
}

impl StatusView {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            listener: None,
            score: None,
        }
    }

    /// Start listening on the relay. Mounting twice keeps one registration.
    pub fn mount(&mut self, relay: &EventRelay) {
        if self.listener.is_none() {
            self.listener = Some(relay.listen(&self.channel));
            debug!("Status view mounted on {}", self.channel);
        }
    }

    /// Stop listening; the last rendered score is kept
    pub fn unmount(&mut self) {
        if self.listener.take().is_some() {
            debug!("Status view unmounted from {}", self.channel);
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.listener.is_some()
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// Apply every queued payload. Returns whether the score changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Some(payload) = self.listener.as_mut().and_then(Listener::try_recv) {
            changed |= self.apply(&payload);
        }
        changed
    }

    /// Wait for the next payload and apply it.
    ///
    /// Returns `false` once unmounted or when the relay is gone.
    pub async fn next_update(&mut self) -> bool {
        loop {
            let Some(listener) = self.listener.as_mut() else {
                return false;
            };
            let Some(payload) = listener.recv().await else {
                return false;
            };
            if self.apply(&payload) {
                return true;
            }
        }
    }

    /// Current label text
    pub fn render(&self) -> String {
        match self.score {
            Some(score) => format_score(score),
            None => PLACEHOLDER.to_string(),
        }
    }

    fn apply(&mut self, payload: &str) -> bool {
        match parse_compound(payload) {
            Ok(score) => {
                self.score = Some(score);
                true
            }
            Err(e) => {
                warn!("Ignoring relay payload: {}", e);
                false
            }
        }
    }
}
