//! Media-element observations and the capability boundary to the host page
//!
//! The guard never touches a real DOM. Hosts (the simulated page, the async
//! driver, a real embedder) describe their video elements as
//! [`VideoObservation`]s and report media events as [`MediaEventKind`]s; the
//! guard answers with [`crate::controller::GuardAction`]s.

use serde::{Deserialize, Serialize};

use crate::Viewport;

/// Identity of a video element, stable for the element's lifetime.
///
/// Hosts assign ids; the guard only compares them. An id is never reused for
/// a different element within one page lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VideoId(pub u64);

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "video#{}", self.0)
    }
}

/// Bounding rectangle in CSS pixels, viewport-relative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width.max(0.0)
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height.max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// On-screen test: non-empty and intersecting the viewport
    pub fn visible_in(&self, viewport: Viewport) -> bool {
        self.area() > 0.0
            && self.bottom() > 0.0
            && self.right() > 0.0
            && self.left < viewport.width as f64
            && self.top < viewport.height as f64
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self { left: 0.0, top: 0.0, width: 0.0, height: 0.0 }
    }
}

/// Media readiness, mirroring `HTMLMediaElement.readyState`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Enough buffered to be playable right now
    pub fn playable(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// One video element's state as observed by the host at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoObservation {
    pub id: VideoId,
    pub rect: Rect,
    pub paused: bool,
    pub ready_state: ReadyState,
    /// Still attached to the document
    pub connected: bool,
    /// Host matched a known main-player selector pattern for this element
    pub player_hint: bool,
    /// `loop` attribute; an ended looping video restarts instead of advancing
    pub looping: bool,
}

impl VideoObservation {
    pub fn playing(&self) -> bool {
        !self.paused
    }
}

/// Pause-family and playback-lifecycle events the guard reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEventKind {
    Pause,
    Suspend,
    Stalled,
    Waiting,
    Ended,
    CanPlay,
    Playing,
}

impl MediaEventKind {
    /// Events the safety net and the listener-wrapping layer care about
    pub fn pause_like(self) -> bool {
        matches!(
            self,
            MediaEventKind::Pause
                | MediaEventKind::Suspend
                | MediaEventKind::Stalled
                | MediaEventKind::Waiting
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaEventKind::Pause => "pause",
            MediaEventKind::Suspend => "suspend",
            MediaEventKind::Stalled => "stalled",
            MediaEventKind::Waiting => "waiting",
            MediaEventKind::Ended => "ended",
            MediaEventKind::CanPlay => "canplay",
            MediaEventKind::Playing => "playing",
        }
    }
}

/// Read-only view of the page the guard consumes when making decisions.
///
/// Implementations must be deterministic for identical page state; the guard
/// queries a fresh view at every decision point rather than caching element
/// state across ticks.
pub trait PageView {
    fn viewport(&self) -> Viewport;

    /// All video elements in encounter (document) order
    fn videos(&self) -> Vec<VideoObservation>;

    fn video(&self, id: VideoId) -> Option<VideoObservation> {
        self.videos().into_iter().find(|v| v.id == id)
    }
}

/// Owned snapshot implementing [`PageView`], handy for hosts and tests that
/// build views from plain data.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub viewport: Viewport,
    pub videos: Vec<VideoObservation>,
}

impl PageView for PageSnapshot {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn videos(&self) -> Vec<VideoObservation> {
        self.videos.clone()
    }
}

/// A keydown as delivered to the guard's capture-phase hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
    /// Focused element at dispatch time, if any
    #[serde(default)]
    pub target: Option<KeyTarget>,
}

impl KeyPress {
    /// A bare press of `key` with no modifiers and no focused element
    pub fn bare(key: &str) -> Self {
        Self {
            key: key.to_string(),
            alt: false,
            ctrl: false,
            meta: false,
            shift: false,
            target: None,
        }
    }

    pub fn has_modifier(&self) -> bool {
        self.alt || self.ctrl || self.meta || self.shift
    }
}

/// What the guard needs to know about the focused element
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyTarget {
    /// Lowercased tag name
    pub tag: String,
    #[serde(default)]
    pub content_editable: bool,
    /// The element's shadow-root host is content-editable
    #[serde(default)]
    pub shadow_host_editable: bool,
}

impl KeyTarget {
    /// Typing into this element must never trigger the guard
    pub fn editable(&self) -> bool {
        self.content_editable
            || self.shadow_host_editable
            || matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_visibility_against_viewport() {
        let vp = Viewport { width: 1280, height: 720 };
        assert!(Rect::new(0.0, 0.0, 640.0, 360.0).visible_in(vp));
        // Fully above the viewport
        assert!(!Rect::new(0.0, -400.0, 640.0, 360.0).visible_in(vp));
        // Off to the right
        assert!(!Rect::new(1300.0, 0.0, 640.0, 360.0).visible_in(vp));
        // Zero area is never visible
        assert!(!Rect::new(10.0, 10.0, 0.0, 360.0).visible_in(vp));
        // Partially on-screen counts
        assert!(Rect::new(-100.0, -100.0, 200.0, 200.0).visible_in(vp));
    }

    #[test]
    fn ready_state_playable_threshold() {
        assert!(!ReadyState::HaveNothing.playable());
        assert!(!ReadyState::HaveMetadata.playable());
        assert!(ReadyState::HaveCurrentData.playable());
        assert!(ReadyState::HaveEnoughData.playable());
    }

    #[test]
    fn editable_targets() {
        let input = KeyTarget { tag: "input".into(), ..Default::default() };
        assert!(input.editable());
        let div = KeyTarget { tag: "div".into(), ..Default::default() };
        assert!(!div.editable());
        let ce = KeyTarget { tag: "div".into(), content_editable: true, ..Default::default() };
        assert!(ce.editable());
        let shadow = KeyTarget {
            tag: "span".into(),
            shadow_host_editable: true,
            ..Default::default()
        };
        assert!(shadow.editable());
    }
}
