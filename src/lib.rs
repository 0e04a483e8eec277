//! Playguard: playback continuity guard
//!
//! Keeps a page's main video playing across host-page pause glitches: the
//! miniplayer-key transition, playlist advances, and single-page-app
//! navigation handoffs. The guard core is a sans-IO state machine
//! ([`controller::GuardController`]) driven entirely by host events and a
//! host clock; the crate ships a deterministic simulated page ([`sim`]) as
//! its in-tree host for tests, benches and the CLI, plus an async driver
//! ([`driver`]) for embedders.
//!
//! # Example
//!
//! ```
//! use playguard::{GuardPolicy, sim::SimPage, sim::VideoSpec};
//! use playguard::media::KeyPress;
//!
//! # fn main() -> playguard::Result<()> {
//! let mut page = SimPage::new();
//! let video = page.append_video(VideoSpec::playing_main());
//! page.attach_guard(GuardPolicy::default())?;
//!
//! // The host page pauses as a side effect of the miniplayer key; the
//! // guard undoes it within the same tick.
//! page.press_key(KeyPress::bare("i"));
//! page.call_pause(video);
//! page.advance(300);
//! assert!(!page.is_paused(video));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod media;
pub mod selector;
pub mod windows;
pub mod schedule;
pub mod trace;
pub mod controller;

// Deterministic simulated page: the in-crate host used by tests and the CLI
pub mod sim;

// Async-friendly driver API (worker-thread abstraction)
pub mod driver;

pub use controller::{GuardAction, GuardController, NavigationSignal, PauseVerdict};
pub use driver::GuardDriver;
pub use media::{KeyPress, VideoId};

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// What the intercepted pause entry point does with a protected element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptStyle {
    /// Let the native pause through, then immediately re-assert play. The
    /// host page's transition logic still sees its pause moment.
    #[default]
    PassThrough,
    /// Drop the native pause entirely for protected elements
    Suppress,
}

/// Key-combo policy: how rapid repeat presses of the trigger key are treated
///
/// A second bare press while the key window is open is part of the same user
/// gesture. With `any_video` set, the combo window protects every video on
/// the page rather than just the tracked one, covering element swaps that
/// happen mid-gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboPolicy {
    pub enabled: bool,
    pub window_ms: u64,
    pub any_video: bool,
}

impl Default for ComboPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 3000,
            any_video: true,
        }
    }
}

/// Guard configuration
///
/// The defaults are the tuned constants of the production behavior; scenario
/// files may override individual fields. The policy is fixed at attach time
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardPolicy {
    /// The miniplayer trigger key, matched case-insensitively with no
    /// modifiers held
    pub trigger_key: String,
    /// How long after the trigger key pauses are neutralized
    pub key_window_ms: u64,
    /// Sub-window extension applied on each enforcement, covering late pause
    /// calls inside the same gesture
    pub micro_extend_ms: u64,
    /// Offsets of the staggered retry burst after an enforcement
    pub burst_steps_ms: Vec<u64>,
    /// How long a playlist/navigation handoff stays protected
    pub handoff_window_ms: u64,
    /// Guard-loop tick cadence while any window is open
    pub guard_interval_ms: u64,
    pub intercept_style: InterceptStyle,
    pub combo: ComboPolicy,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            trigger_key: "i".to_string(),
            key_window_ms: 1500,
            micro_extend_ms: 250,
            burst_steps_ms: vec![0, 16, 48, 96, 160, 240],
            handoff_window_ms: 5000,
            guard_interval_ms: 250,
            intercept_style: InterceptStyle::default(),
            combo: ComboPolicy::default(),
        }
    }
}

/// Attach a guard to a simulated page with the given policy.
///
/// Convenience wrapper over [`sim::SimPage::attach_guard`]; fails with
/// [`Error::AlreadyAttached`] when a guard already runs in this page/frame.
pub fn attach(page: &mut sim::SimPage, policy: GuardPolicy) -> Result<()> {
    page.attach_guard(policy)
}
