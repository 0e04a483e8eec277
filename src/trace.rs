//! Decision trace
//!
//! Every observable decision the guard makes is appended to a trace. The
//! trace serializes to JSON for the CLI and the golden tests, with a sha256
//! digest so scenario outputs can be compared content-addressed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::media::VideoId;
use crate::windows::WindowKind;

/// Why the guard issued (or scheduled) a resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeReason {
    /// Burst scheduled by the trigger key press
    TriggerBurst,
    /// Enforcement after a pause reached the guard (method or event path)
    PauseEnforcement,
    /// Handoff adoption of a freshly ready element
    Handoff,
    /// Periodic guard-loop tick
    GuardTick,
    /// Per-frame check
    FrameCheck,
    /// Re-assert immediately after a suppressed pause
    SuppressedPause,
}

/// How a pause reached enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PausePath {
    /// Through the intercepted prototype method
    Method,
    /// Through the document-level capture safety net
    Event,
    /// After a wrapped host listener completed
    WrappedListener,
}

/// One trace entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Attached { at_ms: u64 },
    InstallRejected { at_ms: u64 },
    TriggerAccepted { at_ms: u64, video: VideoId, combo: bool },
    TriggerIgnored { at_ms: u64, reason: String },
    WindowExtended { at_ms: u64, kind: WindowKind, until: u64 },
    Enforced { at_ms: u64, video: VideoId, path: PausePath },
    PauseSuppressed { at_ms: u64, video: VideoId },
    HandoffArmed { at_ms: u64 },
    HandoffSatisfied { at_ms: u64 },
    Adopted { at_ms: u64, video: VideoId },
    Reset { at_ms: u64, reason: String },
    LoopStarted { at_ms: u64 },
    LoopStopped { at_ms: u64 },
    VisibilityChanged { at_ms: u64, visible: bool },
}

/// Append-only record of guard decisions for one page lifetime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TraceEvent) {
        log::trace!("trace: {:?}", event);
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn to_json(&self) -> String {
        // Serialization of a plain enum vec cannot fail
        serde_json::to_string_pretty(&self.events).unwrap_or_default()
    }

    /// Hex sha256 of the JSON rendering
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json().as_bytes());
        hex::encode(hasher.finalize())
    }
}
