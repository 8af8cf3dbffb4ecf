//! Capture service: the pipeline from observer notification to badge update.
//!
//! Each accepted notification is traversed and sanitized synchronously, then
//! the analysis request runs as a tracked tokio task. Text arriving inside the
//! minimum interval is held back; only the newest held text is sent once the
//! interval elapses. Completions are tagged with a sequence number; a
//! successful one repaints the badge (on the UI thread) and publishes the raw
//! response body on the relay.

use crate::analysis::{Analyzer, HttpAnalyzer};
use crate::change_detector::{ChangeDetector, DispatchDecision};
use crate::config::Config;
use crate::extractor::TextExtractor;
use crate::overlay::{BadgeSurface, OverlayController, OverlayHandle, OverlayThread};
use crate::relay::EventRelay;
use crate::sanitize::prepare_request;
use crate::types::{
    AnalysisRequest, AnalysisResult, ObserverEvent, ObserverEventKind, OverlayError,
    PointerEvent, ScreenSize, ServiceError,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Highest sequence number applied so far; sequence numbers start at 1.
///
/// The check and the application of a result happen under one lock, so
/// results leave the gate in strictly increasing order.
#[derive(Debug, Default)]
pub struct SequenceGate {
    applied: Mutex<u64>,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` and record `seq` if it is newer than every applied one
    pub fn apply_if_newer(&self, seq: u64, apply: impl FnOnce()) -> bool {
        let mut applied = lock(&self.applied);
        if seq <= *applied {
            return false;
        }
        apply();
        *applied = seq;
        true
    }

    pub fn last_applied(&self) -> Option<u64> {
        match *lock(&self.applied) {
            0 => None,
            seq => Some(seq),
        }
    }
}

/// What [`CaptureService::handle_event`] did with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Capture is switched off in the configuration
    Disabled,
    /// Not a content, scroll or focus notification
    Ignored(ObserverEventKind),
    /// The notification carried no window root
    NoRoot,
    /// Nothing visible to analyze
    Empty,
    /// Inside the minimum interval; sent once it elapses unless newer text replaces it
    Throttled,
    /// Same text as the previous request
    Unchanged,
    /// Analysis request `seq` is in flight
    Dispatched { seq: u64 },
}

/// Owns the badge, the in-flight requests and the pipeline state
pub struct CaptureService {
    config: Config,
    /// Screen size for notifications that carry none
    default_screen: ScreenSize,
    dispatcher: Arc<Dispatcher>,
    overlay: OverlayHandle,
    overlay_thread: Option<OverlayThread>,
    relay: EventRelay,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl CaptureService {
    /// Attach the badge and get ready to handle notifications.
    ///
    /// Fails without capturing anything when the badge cannot be attached.
    pub async fn start<S>(
        config: Config,
        analyzer: Arc<dyn Analyzer>,
        surface: S,
        relay: EventRelay,
    ) -> Result<Self, ServiceError>
    where
        S: BadgeSurface + 'static,
    {
        info!("Starting capture service");

        let (overlay, overlay_thread) =
            OverlayController::spawn(surface, config.overlay.default_position()).await?;

        let cancel = CancellationToken::new();
        let tasks = TaskTracker::new();
        let sink = Arc::new(ResultSink {
            overlay: overlay.clone(),
            relay: relay.clone(),
            channel: config.relay.channel.clone(),
            gate: SequenceGate::new(),
            latest_wins: config.analysis.latest_wins,
        });
        let dispatcher = Arc::new(Dispatcher {
            state: Mutex::new(DispatchState {
                detector: ChangeDetector::new(
                    config.capture.min_interval(),
                    config.capture.skip_unchanged,
                ),
                next_seq: 1,
                pending: None,
                flush_scheduled: false,
            }),
            analyzer,
            sink,
            cancel: cancel.clone(),
            tasks: tasks.clone(),
        });

        info!(
            "Capture service ready (channel {}, min interval {:?}, latest wins: {})",
            config.relay.channel,
            config.capture.min_interval(),
            config.analysis.latest_wins
        );

        Ok(Self {
            default_screen: config.capture.screen(),
            config,
            dispatcher,
            overlay,
            overlay_thread: Some(overlay_thread),
            relay,
            cancel,
            tasks,
        })
    }

    /// Start with an HTTP analyzer for the configured endpoint
    pub async fn start_http<S>(
        config: Config,
        surface: S,
        relay: EventRelay,
    ) -> Result<Self, ServiceError>
    where
        S: BadgeSurface + 'static,
    {
        let analyzer = HttpAnalyzer::new(
            config.analysis.endpoint_url.clone(),
            config.analysis.timeout(),
        )?;
        info!("Analysis endpoint: {}", analyzer.endpoint());
        Self::start(config, Arc::new(analyzer), surface, relay).await
    }

    /// Handle one observer notification.
    ///
    /// Must be called inside a tokio runtime; the request itself runs on a
    /// spawned task and this returns immediately.
    pub fn handle_event(&mut self, event: ObserverEvent) -> TriggerOutcome {
        if !self.config.general.enabled {
            return TriggerOutcome::Disabled;
        }

        if !event.kind.is_capture_trigger() {
            trace!("Ignoring {} notification", event.kind.as_str());
            return TriggerOutcome::Ignored(event.kind);
        }

        let Some(root) = event.root.as_ref() else {
            trace!("No root for {} notification", event.kind.as_str());
            return TriggerOutcome::NoRoot;
        };

        let screen = event.screen.unwrap_or(self.default_screen);
        let captured = TextExtractor::new(screen).extract(Some(root));
        debug!("Captured text: {}", captured.as_str());

        let request = prepare_request(&captured);
        if request.text.is_empty() {
            trace!("Nothing visible to analyze");
            return TriggerOutcome::Empty;
        }

        trace!("Capture trigger: {}", event.kind.as_str());
        self.dispatcher.submit(request)
    }

    /// Forward touch input to the badge
    pub fn pointer(&self, event: PointerEvent) -> Result<(), OverlayError> {
        self.overlay.pointer(event)
    }

    pub fn overlay(&self) -> &OverlayHandle {
        &self.overlay
    }

    pub fn relay(&self) -> &EventRelay {
        &self.relay
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of analysis requests still running or waiting out the interval
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until every dispatched and held-back request has completed
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Cancel in-flight and held-back requests, then detach the badge
    pub async fn stop(mut self) {
        info!("Stopping capture service ({} request(s) in flight)", self.tasks.len());
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;

        self.overlay.shutdown();
        if let Some(thread) = self.overlay_thread.take() {
            thread.join().await;
        }
        info!("Capture service stopped");
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.overlay.shutdown();
    }
}

/// Gate state shared between notifications and the deferred flush
struct DispatchState {
    detector: ChangeDetector,
    next_seq: u64,
    /// Newest text that arrived inside the minimum interval
    pending: Option<AnalysisRequest>,
    flush_scheduled: bool,
}

/// Applies the change detector and spawns analysis requests
struct Dispatcher {
    state: Mutex<DispatchState>,
    analyzer: Arc<dyn Analyzer>,
    sink: Arc<ResultSink>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl Dispatcher {
    fn submit(self: &Arc<Self>, request: AnalysisRequest) -> TriggerOutcome {
        let mut state = lock(&self.state);
        match state.detector.check(&request.text, Instant::now()) {
            DispatchDecision::Dispatch => {
                state.pending = None;
                let seq = state.take_seq();
                self.dispatch(seq, request);
                TriggerOutcome::Dispatched { seq }
            }
            DispatchDecision::Unchanged => {
                state.pending = None;
                TriggerOutcome::Unchanged
            }
            DispatchDecision::Throttled => {
                if state.pending.replace(request).is_some() {
                    trace!("Replaced held-back text with newer capture");
                }
                self.schedule_flush(&mut state);
                TriggerOutcome::Throttled
            }
        }
    }

    /// Send the held-back text once the interval elapses
    fn schedule_flush(self: &Arc<Self>, state: &mut DispatchState) {
        if state.flush_scheduled {
            return;
        }
        state.flush_scheduled = true;

        let deadline = state.detector.next_allowed().unwrap_or_else(Instant::now);
        let dispatcher = self.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    trace!("Held-back text discarded on shutdown");
                }
                _ = tokio::time::sleep_until(deadline.into()) => dispatcher.flush(),
            }
        });
    }

    fn flush(self: &Arc<Self>) {
        let mut state = lock(&self.state);
        state.flush_scheduled = false;
        let Some(request) = state.pending.take() else {
            return;
        };

        match state.detector.check(&request.text, Instant::now()) {
            DispatchDecision::Dispatch => {
                let seq = state.take_seq();
                debug!("Sending held-back text as request #{}", seq);
                self.dispatch(seq, request);
            }
            DispatchDecision::Unchanged => {
                trace!("Held-back text matches the last request");
            }
            DispatchDecision::Throttled => {
                state.pending = Some(request);
                self.schedule_flush(&mut state);
            }
        }
    }

    fn dispatch(&self, seq: u64, request: AnalysisRequest) {
        let analyzer = self.analyzer.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();

        debug!("Dispatching request #{} ({} chars)", seq, request.text.len());
        self.tasks.spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Request #{} cancelled", seq);
                    return;
                }
                result = analyzer.analyze(&request) => result,
            };

            match result {
                Ok(analysis) => sink.deliver(seq, analysis),
                Err(e) => warn!("Text analysis request #{} failed: {}", seq, e),
            }
        });
    }
}

impl DispatchState {
    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Where a successful analysis goes
struct ResultSink {
    overlay: OverlayHandle,
    relay: EventRelay,
    channel: String,
    gate: SequenceGate,
    latest_wins: bool,
}

impl ResultSink {
    fn deliver(&self, seq: u64, analysis: AnalysisResult) {
        let apply = || {
            if let Err(e) = self.overlay.update(analysis.compound) {
                warn!("Failed to update badge: {}", e);
            }
            let delivered = self.relay.publish(&self.channel, &analysis.raw);
            trace!("Result #{} delivered to {} listener(s)", seq, delivered);
        };

        if !self.latest_wins {
            apply();
        } else if !self.gate.apply_if_newer(seq, apply) {
            debug!(
                "Dropping stale result of request #{} (last applied #{:?})",
                seq,
                self.gate.last_applied()
            );
        }
    }
}
