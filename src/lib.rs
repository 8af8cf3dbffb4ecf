//! Screen Sentiment - live sentiment overlay for on-screen text
//!
//! This crate captures the text currently visible on screen from an
//! accessibility-tree snapshot, sends it to a remote scoring endpoint and
//! reflects the returned compound score on a draggable overlay badge.
//!
//! - **Extractor**: walks the UI tree and collects visible, on-screen text
//! - **Sanitize**: strips control characters and builds the request payload
//! - **Analysis**: async HTTP client for the scoring endpoint
//! - **Overlay**: the badge, owned by a dedicated UI thread
//! - **Relay**: named-channel pub/sub towards foreground UI surfaces
//! - **Status view**: passive label that renders the latest relayed score
//!
//! # Architecture
//!
//! The [`CaptureService`] receives observer notifications, runs extraction and
//! sanitization synchronously, and spawns one analysis task per trigger.
//! Completed analyses are marshaled back to the overlay's UI thread and
//! published on the [`EventRelay`].

pub mod analysis;
pub mod change_detector;
pub mod config;
pub mod extractor;
pub mod overlay;
pub mod relay;
pub mod sanitize;
pub mod service;
pub mod settings;
pub mod status_view;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use analysis::{parse_analysis_body, Analyzer, HttpAnalyzer};
pub use change_detector::{ChangeDetector, DispatchDecision};
pub use config::Config;
pub use extractor::TextExtractor;
pub use overlay::{
    format_score, score_to_color, BadgeSurface, HeadlessSurface, OverlayController,
    OverlayHandle, OverlayState, OverlayThread,
};
pub use relay::{EventRelay, Listener, Subscription};
pub use sanitize::{prepare_request, sanitize};
pub use service::{CaptureService, SequenceGate, TriggerOutcome};
pub use settings::{permission_instructions, SettingsNavigator, SystemSettings};
pub use status_view::StatusView;
pub use tree::{NodeId, UiNode, UiNodeSpec, UiTree};
pub use types::{
    AnalysisError, AnalysisRequest, AnalysisResult, CapturedText, HostMessage, ObserverEvent,
    ObserverEventKind, OverlayError, PointerEvent, Position, Rect, Rgb, ScreenSize, ServiceError,
};
