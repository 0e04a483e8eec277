//! The guard state machine
//!
//! One `GuardController` runs per page/frame. It is sans-IO: hosts feed it
//! keydowns, media events, navigation signals, mutation and visibility
//! notifications, and pump its task queue with their own clock; it answers
//! with [`GuardAction`]s and, for intercepted pauses, a [`PauseVerdict`].
//! Nothing in here touches real timers or a real DOM.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::media::{KeyPress, MediaEventKind, PageView, VideoId};
use crate::schedule::{Due, TaskQueue};
use crate::selector;
use crate::trace::{PausePath, ResumeReason, Trace, TraceEvent};
use crate::windows::{WindowKind, WindowSet};
use crate::{GuardPolicy, InterceptStyle};

/// The only effect the guard ever requests of its host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardAction {
    /// Call the native play entry point on `video`; swallow rejection.
    /// Redundant when the video is already playing (a no-op for the host).
    Resume { video: VideoId, reason: ResumeReason },
}

/// What the intercepted pause entry point should do with the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseVerdict {
    /// Let the native pause through
    Proceed,
    /// Skip the native pause entirely
    Suppress,
}

/// Navigation-lifecycle signals from the host single-page application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum NavigationSignal {
    /// SPA navigation started (host fires this before tearing down the player)
    Started,
    /// SPA navigation finished; stale tracked elements are cleared here
    Finished,
    /// History change to `url`; only URLs carrying a playlist parameter arm
    /// the handoff
    HistoryChanged { url: String },
    /// Click landed in playlist/queue UI
    PlaylistClick,
}

/// Registration options, the DOM triple that disambiguates listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ListenerOptions {
    pub capture: bool,
    pub passive: bool,
    pub once: bool,
}

/// Handle to an installed wrapper, returned to the host so its
/// `removeEventListener` path can drop the right one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrapId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WrapKey {
    video: VideoId,
    kind: MediaEventKind,
    listener: u64,
    options: ListenerOptions,
}

/// Wrapped-listener registry.
///
/// Invariant: every wrap is reversible. Removing with the same
/// (element, event type, listener identity, options) key yields the same
/// `WrapId` that `register` handed out, and exactly once.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    map: HashMap<WrapKey, WrapId>,
    next: u64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a wrapper. Returns `None` for a duplicate registration,
    /// matching the DOM's add-same-listener no-op.
    pub fn register(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        listener: u64,
        options: ListenerOptions,
    ) -> Option<WrapId> {
        let key = WrapKey { video, kind, listener, options };
        if self.map.contains_key(&key) {
            return None;
        }
        let id = WrapId(self.next);
        self.next += 1;
        self.map.insert(key, id);
        Some(id)
    }

    /// Remove a wrapper. `None` when nothing matched, a silent no-op as in
    /// the DOM.
    pub fn remove(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        listener: u64,
        options: ListenerOptions,
    ) -> Option<WrapId> {
        self.map.remove(&WrapKey { video, kind, listener, options })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Internal deferred work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    /// Microtask: enforce on `video` if still paused and protected
    Enforce { video: VideoId, path: PausePath },
    /// Burst step: resume `video` if found paused and protected
    BurstCheck { video: VideoId, reason: ResumeReason },
    /// Periodic guard-loop tick
    GuardTick,
}

/// Playback continuity guard for one page/frame
pub struct GuardController {
    policy: GuardPolicy,
    windows: WindowSet,
    tracked: Option<VideoId>,
    last_was_playing: bool,
    queue: TaskQueue<Task>,
    registry: ListenerRegistry,
    /// Videos with an enforcement microtask already queued; collapses the
    /// method-path and event-path reactions to one enforcement per pause
    pending_enforce: HashSet<VideoId>,
    loop_armed: bool,
    suspended: bool,
    trace: Trace,
}

impl GuardController {
    pub fn new(policy: GuardPolicy) -> Self {
        Self {
            policy,
            windows: WindowSet::new(),
            tracked: None,
            last_was_playing: false,
            queue: TaskQueue::new(),
            registry: ListenerRegistry::new(),
            pending_enforce: HashSet::new(),
            loop_armed: false,
            suspended: false,
            trace: Trace::new(),
        }
    }

    /// Host hooks are installed; record the attach point.
    pub fn attached(&mut self, now: u64) {
        self.trace.push(TraceEvent::Attached { at_ms: now });
    }

    /// A later install attempt hit the locked pause slot
    pub fn trace_install_rejected(&mut self, now: u64) {
        self.trace.push(TraceEvent::InstallRejected { at_ms: now });
    }

    pub fn policy(&self) -> &GuardPolicy {
        &self.policy
    }

    pub fn tracked(&self) -> Option<VideoId> {
        self.tracked
    }

    pub fn windows(&self) -> &WindowSet {
        &self.windows
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// No open window and no queued work
    pub fn is_idle(&self, now: u64) -> bool {
        !self.windows.any_open(now) && self.queue.is_empty()
    }

    /// Earliest internal timer deadline, for host pumps
    pub fn next_deadline(&self) -> Option<u64> {
        self.queue.next_deadline()
    }

    /// Microtasks are queued; hosts drain them after the current task
    pub fn has_pending_microtasks(&self) -> bool {
        self.queue.has_micro()
    }

    /// Combined protection check across all windows
    pub fn is_protected(&self, video: VideoId, now: u64) -> bool {
        let tracked_protected = self.tracked == Some(video)
            && self.last_was_playing
            && (self.windows.is_open(WindowKind::Key, now) || self.windows.handoff_active(now));
        let combo_protected =
            self.windows.is_open(WindowKind::Combo, now) && self.policy.combo.any_video;
        tracked_protected || combo_protected
    }

    // ---- Trigger detector ----

    /// Capture-phase keydown hook. Runs before the host page's own handlers,
    /// so the playing-state snapshot reflects pre-trigger state.
    pub fn on_keydown(&mut self, press: &KeyPress, now: u64, view: &dyn PageView) -> Vec<GuardAction> {
        if !press.key.eq_ignore_ascii_case(&self.policy.trigger_key) || press.has_modifier() {
            return Vec::new();
        }
        if press.target.as_ref().is_some_and(|t| t.editable()) {
            self.trace.push(TraceEvent::TriggerIgnored {
                at_ms: now,
                reason: "editable target".into(),
            });
            return Vec::new();
        }
        let Some(main) = selector::pick_from(view) else {
            self.trace.push(TraceEvent::TriggerIgnored { at_ms: now, reason: "no video".into() });
            return Vec::new();
        };

        if self.windows.is_open(WindowKind::Key, now) {
            // Second press inside the key window: part of the same gesture.
            // Keep the original snapshot (the host may have it mid-pause)
            // and broaden per the combo policy.
            let video = self.tracked.unwrap_or(main.id);
            self.trace.push(TraceEvent::TriggerAccepted { at_ms: now, video, combo: true });
            self.extend_window(WindowKind::Key, now, self.policy.key_window_ms);
            if self.policy.combo.enabled {
                self.extend_window(WindowKind::Combo, now, self.policy.combo.window_ms);
            }
            self.arm_loop(now);
            self.schedule_burst(video, ResumeReason::TriggerBurst, now);
            return Vec::new();
        }

        self.tracked = Some(main.id);
        self.last_was_playing = main.playing();
        if !self.last_was_playing {
            // Never resurrect an intentionally paused video
            self.trace.push(TraceEvent::TriggerIgnored {
                at_ms: now,
                reason: "video was paused".into(),
            });
            return Vec::new();
        }
        log::debug!("trigger accepted for {} at {}ms", main.id, now);
        self.trace.push(TraceEvent::TriggerAccepted { at_ms: now, video: main.id, combo: false });
        self.extend_window(WindowKind::Key, now, self.policy.key_window_ms);
        self.arm_loop(now);
        self.schedule_burst(main.id, ResumeReason::TriggerBurst, now);
        Vec::new()
    }

    // ---- Native-method interception ----

    /// The intercepted pause entry point was invoked on `video`. Evaluated on
    /// pre-pause state. For `Proceed` verdicts on protected elements the
    /// enforcement runs as a microtask after the native pause lands.
    pub fn intercepted_pause(
        &mut self,
        video: VideoId,
        now: u64,
        _view: &dyn PageView,
    ) -> (PauseVerdict, Vec<GuardAction>) {
        if !self.is_protected(video, now) {
            return (PauseVerdict::Proceed, Vec::new());
        }
        match self.policy.intercept_style {
            InterceptStyle::PassThrough => {
                self.schedule_enforce(video, PausePath::Method, now);
                (PauseVerdict::Proceed, Vec::new())
            }
            InterceptStyle::Suppress => {
                self.trace.push(TraceEvent::PauseSuppressed { at_ms: now, video });
                self.micro_extend(video, now);
                self.schedule_burst(video, ResumeReason::SuppressedPause, now);
                (
                    PauseVerdict::Suppress,
                    vec![GuardAction::Resume { video, reason: ResumeReason::SuppressedPause }],
                )
            }
        }
    }

    // ---- Event-level safety net & playback lifecycle ----

    /// Document-level capture hook for media events
    pub fn on_media_event(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        now: u64,
        view: &dyn PageView,
    ) -> Vec<GuardAction> {
        let mut out = Vec::new();
        match kind {
            k if k.pause_like() => {
                if self.is_protected(video, now) {
                    self.schedule_enforce(video, PausePath::Event, now);
                }
            }
            MediaEventKind::Ended => {
                let looping = view.video(video).map(|o| o.looping).unwrap_or(false);
                if !looping {
                    self.trace.push(TraceEvent::HandoffArmed { at_ms: now });
                    self.extend_window(WindowKind::Handoff, now, self.policy.handoff_window_ms);
                    self.arm_loop(now);
                }
            }
            MediaEventKind::CanPlay => {
                if self.windows.handoff_active(now) {
                    let paused = view.video(video).map(|o| o.paused).unwrap_or(false);
                    if paused {
                        // A fresh element is ready after the handoff: adopt it
                        let adopted =
                            selector::pick_from(view).map(|o| o.id).unwrap_or(video);
                        self.tracked = Some(adopted);
                        self.last_was_playing = true;
                        self.trace.push(TraceEvent::Adopted { at_ms: now, video: adopted });
                        out.push(GuardAction::Resume { video, reason: ResumeReason::Handoff });
                        self.schedule_burst(video, ResumeReason::Handoff, now);
                    }
                }
            }
            MediaEventKind::Playing => {
                if self.windows.is_open(WindowKind::Handoff, now) && self.windows.handoff_active(now)
                {
                    self.windows.satisfy_handoff();
                    self.trace.push(TraceEvent::HandoffSatisfied { at_ms: now });
                }
            }
            _ => {}
        }
        out
    }

    // ---- Listener-wrapping layer ----

    /// The host is adding a pause-like listener on a video element; install a
    /// wrapper so enforcement runs after the host handler completes. `None`
    /// for non-pause-like kinds and duplicate registrations.
    pub fn wrap_listener(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        listener: u64,
        options: ListenerOptions,
    ) -> Option<WrapId> {
        if !kind.pause_like() {
            return None;
        }
        self.registry.register(video, kind, listener, options)
    }

    /// Mirror of `removeEventListener`: drop the wrapper for exactly this key
    pub fn unwrap_listener(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        listener: u64,
        options: ListenerOptions,
    ) -> Option<WrapId> {
        self.registry.remove(video, kind, listener, options)
    }

    /// A wrapped host handler just finished running; enforce on the next
    /// microtask so we never fight the handler mid-execution.
    pub fn after_wrapped_listener(&mut self, video: VideoId, kind: MediaEventKind, now: u64) {
        if kind.pause_like() && self.is_protected(video, now) {
            self.schedule_enforce(video, PausePath::WrappedListener, now);
        }
    }

    // ---- Handoff & navigation triggers ----

    pub fn on_navigation(
        &mut self,
        signal: &NavigationSignal,
        now: u64,
        view: &dyn PageView,
    ) -> Vec<GuardAction> {
        match signal {
            NavigationSignal::Started | NavigationSignal::PlaylistClick => {
                self.trace.push(TraceEvent::HandoffArmed { at_ms: now });
                self.extend_window(WindowKind::Handoff, now, self.policy.handoff_window_ms);
                self.arm_loop(now);
            }
            NavigationSignal::Finished => {
                self.clear_if_gone(now, view, "navigation finished with tracked element gone");
            }
            NavigationSignal::HistoryChanged { url } => {
                if url_carries_playlist(url) {
                    self.trace.push(TraceEvent::HandoffArmed { at_ms: now });
                    self.extend_window(WindowKind::Handoff, now, self.policy.handoff_window_ms);
                    self.arm_loop(now);
                }
            }
        }
        Vec::new()
    }

    /// DOM mutation notification; detects the tracked element detaching
    pub fn on_mutation(&mut self, now: u64, view: &dyn PageView) {
        self.clear_if_gone(now, view, "tracked element detached");
    }

    pub fn on_visibility(&mut self, visible: bool, now: u64) {
        self.trace.push(TraceEvent::VisibilityChanged { at_ms: now, visible });
        if visible {
            self.suspended = false;
            if self.windows.any_open(now) {
                self.arm_loop(now);
            }
        } else {
            self.suspended = true;
            // A user gesture does not outlive leaving the tab; the handoff
            // window survives (playlist advance continues in hidden tabs)
            self.windows.reset_gesture();
        }
    }

    // ---- Scheduling pump ----

    /// Run internal timers with `due_at <= now`
    pub fn run_due(&mut self, now: u64, view: &dyn PageView) -> Vec<GuardAction> {
        let mut out = Vec::new();
        for task in self.queue.take_due(now) {
            self.run_task(task, now, view, &mut out);
        }
        out
    }

    /// Drain queued microtasks; hosts call this after every event dispatch
    pub fn drain_microtasks(&mut self, now: u64, view: &dyn PageView) -> Vec<GuardAction> {
        let mut out = Vec::new();
        while self.queue.has_micro() {
            for task in self.queue.take_micro() {
                self.run_task(task, now, view, &mut out);
            }
        }
        out
    }

    /// Animation frame: run frame-scheduled tasks plus the per-frame check.
    /// Hosts only call this while the page is visible.
    pub fn on_frame(&mut self, now: u64, view: &dyn PageView) -> Vec<GuardAction> {
        let mut out = Vec::new();
        for task in self.queue.take_frame() {
            self.run_task(task, now, view, &mut out);
        }
        if !self.suspended && self.windows.any_open(now) {
            self.check_protected_paused(now, view, ResumeReason::FrameCheck, &mut out);
        }
        out
    }

    // ---- Internals ----

    fn run_task(&mut self, task: Task, now: u64, view: &dyn PageView, out: &mut Vec<GuardAction>) {
        match task {
            Task::Enforce { video, path } => {
                self.pending_enforce.remove(&video);
                let Some(obs) = view.video(video) else { return };
                if obs.connected && obs.paused && self.is_protected(video, now) {
                    self.trace.push(TraceEvent::Enforced { at_ms: now, video, path });
                    out.push(GuardAction::Resume {
                        video,
                        reason: ResumeReason::PauseEnforcement,
                    });
                    self.micro_extend(video, now);
                    self.schedule_burst(video, ResumeReason::PauseEnforcement, now);
                }
            }
            Task::BurstCheck { video, reason } => {
                if let Some(obs) = view.video(video) {
                    if obs.connected && obs.paused && self.is_protected(video, now) {
                        out.push(GuardAction::Resume { video, reason });
                    }
                }
            }
            Task::GuardTick => self.run_guard_tick(now, view, out),
        }
    }

    fn run_guard_tick(&mut self, now: u64, view: &dyn PageView, out: &mut Vec<GuardAction>) {
        if self.suspended {
            self.loop_armed = false;
            return;
        }
        if !self.windows.any_open(now) {
            self.loop_armed = false;
            self.trace.push(TraceEvent::LoopStopped { at_ms: now });
            return;
        }
        if let Some(tracked) = self.tracked {
            let gone = view.video(tracked).map(|o| !o.connected).unwrap_or(true);
            if gone {
                self.reset_state(now, "tracked element detached");
                self.loop_armed = false;
                self.trace.push(TraceEvent::LoopStopped { at_ms: now });
                return;
            }
        } else if !self.windows.is_open(WindowKind::Combo, now) {
            self.loop_armed = false;
            self.trace.push(TraceEvent::LoopStopped { at_ms: now });
            return;
        }
        self.check_protected_paused(now, view, ResumeReason::GuardTick, out);
        self.queue.schedule(Due::AfterMs(self.policy.guard_interval_ms), now, Task::GuardTick);
    }

    /// Re-assert play on whatever is currently protected and paused: the
    /// tracked element, or any element during a combo window
    fn check_protected_paused(
        &mut self,
        now: u64,
        view: &dyn PageView,
        reason: ResumeReason,
        out: &mut Vec<GuardAction>,
    ) {
        let combo_any =
            self.windows.is_open(WindowKind::Combo, now) && self.policy.combo.any_video;
        if combo_any {
            for obs in view.videos() {
                if obs.connected && obs.paused && self.is_protected(obs.id, now) {
                    out.push(GuardAction::Resume { video: obs.id, reason });
                }
            }
        } else if let Some(tracked) = self.tracked {
            if let Some(obs) = view.video(tracked) {
                if obs.connected && obs.paused && self.is_protected(tracked, now) {
                    out.push(GuardAction::Resume { video: tracked, reason });
                }
            }
        }
    }

    fn schedule_enforce(&mut self, video: VideoId, path: PausePath, now: u64) {
        // One enforcement per pause, whichever path saw it first
        if self.pending_enforce.insert(video) {
            self.queue.schedule(Due::Microtask, now, Task::Enforce { video, path });
        }
    }

    /// Frame-first, then staggered timeouts, racing any late pausers
    fn schedule_burst(&mut self, video: VideoId, reason: ResumeReason, now: u64) {
        self.queue.schedule(Due::NextFrame, now, Task::BurstCheck { video, reason });
        let steps = self.policy.burst_steps_ms.clone();
        for ms in steps {
            self.queue.schedule(Due::AfterMs(ms), now, Task::BurstCheck { video, reason });
        }
    }

    /// Cover late pause calls belonging to the same gesture
    fn micro_extend(&mut self, video: VideoId, now: u64) {
        if self.windows.is_open(WindowKind::Key, now) && self.tracked == Some(video) {
            self.extend_window(WindowKind::Key, now, self.policy.micro_extend_ms);
        }
        if self.windows.handoff_active(now) && self.tracked == Some(video) {
            self.extend_window(WindowKind::Handoff, now, self.policy.micro_extend_ms);
        }
        if self.windows.is_open(WindowKind::Combo, now) && self.policy.combo.any_video {
            self.extend_window(WindowKind::Combo, now, self.policy.micro_extend_ms);
        }
    }

    fn extend_window(&mut self, kind: WindowKind, now: u64, duration_ms: u64) {
        if duration_ms == 0 {
            return;
        }
        self.windows.extend(kind, now, duration_ms);
        self.trace.push(TraceEvent::WindowExtended {
            at_ms: now,
            kind,
            until: self.windows.until(kind),
        });
    }

    fn arm_loop(&mut self, now: u64) {
        if self.loop_armed || self.suspended {
            return;
        }
        self.loop_armed = true;
        self.trace.push(TraceEvent::LoopStarted { at_ms: now });
        self.queue.schedule(Due::AfterMs(self.policy.guard_interval_ms), now, Task::GuardTick);
    }

    fn clear_if_gone(&mut self, now: u64, view: &dyn PageView, reason: &str) {
        let Some(tracked) = self.tracked else { return };
        let gone = view.video(tracked).map(|o| !o.connected).unwrap_or(true);
        if gone {
            self.reset_state(now, reason);
        }
    }

    fn reset_state(&mut self, now: u64, reason: &str) {
        log::debug!("guard reset at {}ms: {}", now, reason);
        self.windows.reset_all();
        self.tracked = None;
        self.last_was_playing = false;
        self.pending_enforce.clear();
        self.queue.clear();
        self.loop_armed = false;
        self.trace.push(TraceEvent::Reset { at_ms: now, reason: reason.to_string() });
    }
}

/// Does this URL's query string carry a playlist parameter? Malformed URLs
/// are swallowed: a bad href must never break the guard.
fn url_carries_playlist(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(u) => u.query_pairs().any(|(k, v)| k == "list" && !v.is_empty()),
        Err(e) => {
            log::debug!("ignoring malformed navigation url {:?}: {}", raw, e);
            false
        }
    }
}
