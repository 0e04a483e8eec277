//! Protection windows
//!
//! A window is an expiry timestamp: protection is active while
//! `now <= until`. Three independent windows exist (miniplayer key,
//! playlist/navigation handoff, key-combo) and are combined by logical OR
//! when deciding whether an element is protected. Expiries only grow
//! (`extend` is a max) and close only by time passing or an explicit reset.

use serde::{Deserialize, Serialize};

/// Which protection window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Opened by the miniplayer trigger key
    Key,
    /// Opened by playlist-advance and navigation handoffs
    Handoff,
    /// Opened by a rapid repeat press treated as one gesture
    Combo,
}

/// The set of protection windows, all expiries in host-clock milliseconds.
/// `0` means never opened; a reset returns an expiry to `0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSet {
    key_until: u64,
    handoff_until: u64,
    combo_until: u64,
    /// Playback was observed while the handoff window was open; the handoff
    /// stops acting but its expiry is left alone.
    handoff_satisfied: bool,
}

impl WindowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonically extend `kind` to at least `now + duration_ms`.
    /// A zero duration opens nothing.
    pub fn extend(&mut self, kind: WindowKind, now: u64, duration_ms: u64) {
        if duration_ms == 0 {
            return;
        }
        let until = now.saturating_add(duration_ms);
        let slot = self.slot_mut(kind);
        *slot = (*slot).max(until);
        if kind == WindowKind::Handoff {
            // A fresh handoff trigger re-arms a satisfied window
            self.handoff_satisfied = false;
        }
    }

    pub fn is_open(&self, kind: WindowKind, now: u64) -> bool {
        let until = self.slot(kind);
        until > 0 && now <= until
    }

    /// Handoff is open and has not yet seen playback
    pub fn handoff_active(&self, now: u64) -> bool {
        self.is_open(WindowKind::Handoff, now) && !self.handoff_satisfied
    }

    pub fn any_open(&self, now: u64) -> bool {
        self.is_open(WindowKind::Key, now)
            || self.is_open(WindowKind::Handoff, now)
            || self.is_open(WindowKind::Combo, now)
    }

    pub fn until(&self, kind: WindowKind) -> u64 {
        self.slot(kind)
    }

    pub fn satisfy_handoff(&mut self) {
        self.handoff_satisfied = true;
    }

    /// Close everything (tracked element detached, navigation-away)
    pub fn reset_all(&mut self) {
        self.key_until = 0;
        self.handoff_until = 0;
        self.combo_until = 0;
        self.handoff_satisfied = false;
    }

    /// Close the gesture-scoped windows only; the handoff survives
    /// visibility loss (playlist advance continues in hidden tabs).
    pub fn reset_gesture(&mut self) {
        self.key_until = 0;
        self.combo_until = 0;
    }

    fn slot(&self, kind: WindowKind) -> u64 {
        match kind {
            WindowKind::Key => self.key_until,
            WindowKind::Handoff => self.handoff_until,
            WindowKind::Combo => self.combo_until,
        }
    }

    fn slot_mut(&mut self, kind: WindowKind) -> &mut u64 {
        match kind {
            WindowKind::Key => &mut self.key_until,
            WindowKind::Handoff => &mut self.handoff_until,
            WindowKind::Combo => &mut self.combo_until,
        }
    }
}
