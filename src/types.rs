//! Core types used throughout the capture pipeline.
//!
//! This module defines the geometry, observer notifications, analysis payloads
//! and error types shared by the extractor, the overlay and the service.

use crate::tree::UiTree;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in screen coordinates (right/bottom exclusive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// A rectangle with no area never intersects anything
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Check whether the two rectangles share a region of non-zero area.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

/// Size of the device's visible screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The visible screen rectangle `[0, 0, width, height]`
    pub fn bounds(&self) -> Rect {
        Rect::new(
            0,
            0,
            i32::try_from(self.width).unwrap_or(i32::MAX),
            i32::try_from(self.height).unwrap_or(i32::MAX),
        )
    }
}

/// Badge position in screen coordinates (top-left anchored)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Opaque RGB color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed `0xAARRGGBB` with full alpha
    pub fn to_argb(&self) -> u32 {
        0xFF00_0000 | (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Kind of notification delivered by the platform observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverEventKind {
    /// Window content changed
    WindowContentChanged,
    /// A view was scrolled
    ViewScrolled,
    /// A view gained focus
    ViewFocused,
    /// Any other notification (ignored)
    #[serde(other)]
    Other,
}

impl ObserverEventKind {
    /// Whether this notification should trigger a traversal
    pub fn is_capture_trigger(&self) -> bool {
        matches!(
            self,
            ObserverEventKind::WindowContentChanged
                | ObserverEventKind::ViewScrolled
                | ObserverEventKind::ViewFocused
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObserverEventKind::WindowContentChanged => "window_content_changed",
            ObserverEventKind::ViewScrolled => "view_scrolled",
            ObserverEventKind::ViewFocused => "view_focused",
            ObserverEventKind::Other => "other",
        }
    }
}

/// Notification from the platform observer with the active window's snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct ObserverEvent {
    pub kind: ObserverEventKind,
    /// Root of the active window, absent when the platform has none
    #[serde(default)]
    pub root: Option<UiTree>,
    /// Screen size at the time of the event (falls back to configuration)
    #[serde(default)]
    pub screen: Option<ScreenSize>,
}

impl ObserverEvent {
    pub fn new(kind: ObserverEventKind, root: Option<UiTree>) -> Self {
        Self {
            kind,
            root,
            screen: None,
        }
    }

    pub fn with_screen(mut self, screen: ScreenSize) -> Self {
        self.screen = Some(screen);
        self
    }
}

/// Raw pointer input on the badge (screen coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
}

/// Messages the host harness reads from stdin
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Accessibility notification with a tree snapshot
    Observer(ObserverEvent),
    /// Touch input on the overlay badge
    Pointer(PointerEvent),
}

/// Text captured from one traversal, newline separated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedText(String);

impl CapturedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Request body sent to the scoring endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub text: String,
}

/// Parsed scoring response with the body it was parsed from
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Compound polarity in [-1.0, 1.0]
    pub compound: f64,
    /// Response body exactly as received; this is what gets relayed
    pub raw: String,
}

/// Errors from the analysis request
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors from the overlay badge
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Overlay permission denied: {0}")]
    PermissionDenied(String),

    #[error("Overlay UI thread is not running")]
    Closed,

    #[error("Failed to start overlay UI thread: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that stop the capture service from starting
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
