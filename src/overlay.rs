//! Floating sentiment badge.
//!
//! The badge is a single always-on-top surface drawn by a [`BadgeSurface`]
//! implementation. Its state is owned by an [`OverlayController`] that lives on
//! a dedicated UI thread; every other context talks to it through an
//! [`OverlayHandle`], which marshals commands onto that thread.
//!
//! # Appearance
//!
//! A compound score `s` in [-1, 1] maps linearly from red to green:
//! green = `255 * (s + 1) / 2`, red = `255 * (1 - (s + 1) / 2)`, blue = 0.
//! Channels are truncated toward zero, so a neutral score renders as
//! `(127, 127, 0)`. The label is the score with two decimals.

use crate::types::{OverlayError, PointerEvent, Position, Rgb};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Color before the first score arrives
const PENDING_COLOR: Rgb = Rgb::new(122, 122, 122);

/// Label before the first score arrives
const PENDING_LABEL: &str = "--";

/// Map a compound score to the badge color
pub fn score_to_color(score: f64) -> Rgb {
    // Out-of-range scores would overflow a channel; the label still shows them as-is
    let score = if score.is_nan() { 0.0 } else { score.clamp(-1.0, 1.0) };
    let positive = (score + 1.0) / 2.0;
    let green = (255.0 * positive) as u8;
    let red = (255.0 * (1.0 - positive)) as u8;
    Rgb::new(red, green, 0)
}

/// Format a score with exactly two decimals
pub fn format_score(score: f64) -> String {
    let label = format!("{:.2}", score);
    // -0.004 and -0.0 both round to zero; never show a signed zero
    if label == "-0.00" {
        "0.00".to_string()
    } else {
        label
    }
}

/// Platform surface that draws the badge
pub trait BadgeSurface: Send {
    /// Add the badge to the screen at `position`
    fn attach(&mut self, position: Position) -> Result<(), OverlayError>;

    /// Move the badge
    fn set_position(&mut self, position: Position);

    /// Repaint the badge background and label
    fn set_appearance(&mut self, color: Rgb, label: &str);

    /// Remove the badge from the screen
    fn detach(&mut self) {}
}

/// Surface for hosts without a native overlay: logs every change
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    denied: bool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self { denied: false }
    }

    /// A surface whose attach always fails, as without overlay permission
    pub fn denied() -> Self {
        Self { denied: true }
    }
}

impl BadgeSurface for HeadlessSurface {
    fn attach(&mut self, position: Position) -> Result<(), OverlayError> {
        if self.denied {
            return Err(OverlayError::PermissionDenied(
                "drawing over other apps is not allowed".to_string(),
            ));
        }
        info!("Badge attached at ({}, {})", position.x, position.y);
        Ok(())
    }

    fn set_position(&mut self, position: Position) {
        trace!("Badge moved to ({}, {})", position.x, position.y);
    }

    fn set_appearance(&mut self, color: Rgb, label: &str) {
        info!("Badge {} [{}]", label, color);
    }

    fn detach(&mut self) {
        debug!("Badge detached");
    }
}

/// Visible state of the badge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayState {
    pub position: Position,
    pub color: Rgb,
    pub label: String,
}

/// Where a drag started
#[derive(Debug, Clone, Copy)]
struct DragStart {
    position: Position,
    pointer_x: f32,
    pointer_y: f32,
}

/// Commands executed on the UI thread
#[derive(Debug)]
pub enum OverlayCommand {
    /// Repaint for a compound score
    Score(f64),
    /// Touch input on the badge
    Pointer(PointerEvent),
    /// Report the current state
    Snapshot(oneshot::Sender<OverlayState>),
    /// Detach and stop the UI thread
    Shutdown,
}

/// Owner of the badge state; lives on the UI thread
pub struct OverlayController<S: BadgeSurface> {
    surface: S,
    state: OverlayState,
    attached: bool,
    drag: Option<DragStart>,
}

impl<S: BadgeSurface> OverlayController<S> {
    /// Create an unattached controller
    pub fn new(surface: S, default_position: Position) -> Self {
        Self {
            surface,
            state: OverlayState {
                position: default_position,
                color: PENDING_COLOR,
                label: PENDING_LABEL.to_string(),
            },
            attached: false,
            drag: None,
        }
    }

    /// Put the badge on screen at its default position
    pub fn attach(&mut self) -> Result<(), OverlayError> {
        if self.attached {
            return Ok(());
        }
        self.surface.attach(self.state.position)?;
        self.surface
            .set_appearance(self.state.color, &self.state.label);
        self.attached = true;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    /// Repaint the badge for `score`
    pub fn update(&mut self, score: f64) {
        if !self.attached {
            warn!("Ignoring score {} for a badge that is not attached", score);
            return;
        }
        self.state.color = score_to_color(score);
        self.state.label = format_score(score);
        self.surface
            .set_appearance(self.state.color, &self.state.label);
    }

    /// Handle touch input. Returns whether the event was consumed.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Down { x, y } => {
                self.drag = Some(DragStart {
                    position: self.state.position,
                    pointer_x: x,
                    pointer_y: y,
                });
                true
            }
            PointerEvent::Move { x, y } => {
                let Some(start) = self.drag else {
                    return false;
                };
                // No clamping: the badge may leave the screen, but never wraps
                let position = Position::new(
                    start.position.x.saturating_add((x - start.pointer_x) as i32),
                    start.position.y.saturating_add((y - start.pointer_y) as i32),
                );
                self.state.position = position;
                if self.attached {
                    self.surface.set_position(position);
                }
                true
            }
            PointerEvent::Up => {
                self.drag = None;
                false
            }
        }
    }

    fn run(mut self, mut commands: mpsc::UnboundedReceiver<OverlayCommand>) {
        while let Some(command) = commands.blocking_recv() {
            match command {
                OverlayCommand::Score(score) => self.update(score),
                OverlayCommand::Pointer(event) => {
                    self.handle_pointer(event);
                }
                OverlayCommand::Snapshot(reply) => {
                    let _ = reply.send(self.state.clone());
                }
                OverlayCommand::Shutdown => break,
            }
        }

        if self.attached {
            self.surface.detach();
            self.attached = false;
        }
        info!("Overlay UI thread stopped");
    }
}

impl<S: BadgeSurface + 'static> OverlayController<S> {
    /// Start the UI thread and attach the badge on it.
    ///
    /// Fails with [`OverlayError::PermissionDenied`] when the surface refuses
    /// to attach; the thread is gone by then.
    pub async fn spawn(
        surface: S,
        default_position: Position,
    ) -> Result<(OverlayHandle, OverlayThread), OverlayError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("overlay-ui".to_string())
            .spawn(move || {
                let mut controller = OverlayController::new(surface, default_position);
                match controller.attach() {
                    Ok(()) => {
                        let _ = ready_tx.send(Ok(()));
                        controller.run(rx);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })?;

        let attached = ready_rx.await.map_err(|_| OverlayError::Closed)?;
        let thread = OverlayThread {
            join: Some(thread),
        };
        match attached {
            Ok(()) => Ok((OverlayHandle { tx }, thread)),
            Err(e) => {
                thread.join().await;
                Err(e)
            }
        }
    }
}

/// Cloneable sender side of the UI thread
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    tx: mpsc::UnboundedSender<OverlayCommand>,
}

impl OverlayHandle {
    /// Repaint the badge for `score`.
    ///
    /// Scores are applied in the order they are sent.
    pub fn update(&self, score: f64) -> Result<(), OverlayError> {
        self.send(OverlayCommand::Score(score))
    }

    /// Forward touch input to the badge
    pub fn pointer(&self, event: PointerEvent) -> Result<(), OverlayError> {
        self.send(OverlayCommand::Pointer(event))
    }

    /// Current badge state, read on the UI thread after all queued commands
    pub async fn state(&self) -> Result<OverlayState, OverlayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(OverlayCommand::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| OverlayError::Closed)
    }

    /// Ask the UI thread to detach the badge and exit
    pub fn shutdown(&self) {
        let _ = self.tx.send(OverlayCommand::Shutdown);
    }

    fn send(&self, command: OverlayCommand) -> Result<(), OverlayError> {
        self.tx.send(command).map_err(|_| OverlayError::Closed)
    }
}

/// Join handle of the UI thread
pub struct OverlayThread {
    join: Option<std::thread::JoinHandle<()>>,
}

impl OverlayThread {
    /// Wait for the UI thread to exit without blocking the runtime
    pub async fn join(mut self) {
        if let Some(join) = self.join.take() {
            match tokio::task::spawn_blocking(move || join.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Overlay UI thread panicked"),
                Err(e) => warn!("Failed to join overlay UI thread: {}", e),
            }
        }
    }
}
