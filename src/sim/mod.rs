//! Deterministic simulated page
//!
//! The guard's in-crate host: a virtual-clock page with video elements,
//! data-driven host-page listeners, capture-then-target event dispatch, the
//! pause-interception slot, and the listener-wrapping plumbing. Tests,
//! benches, the CLI and the demos all drive the guard through this page, so
//! every run is reproducible down to the millisecond.
//!
//! The page models exactly the surface the guard consumes. It is not a DOM
//! implementation: elements are flat records, events carry no payloads, and
//! host-page behavior is expressed as [`HostReaction`] data instead of
//! script.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::controller::{
    GuardAction, GuardController, ListenerOptions, NavigationSignal, PauseVerdict,
};
use crate::media::{
    KeyPress, MediaEventKind, PageSnapshot, ReadyState, Rect, VideoId, VideoObservation,
};
use crate::trace::{ResumeReason, Trace};
use crate::{Error, GuardPolicy, Result, Viewport};

pub mod scenario;

pub use scenario::{run_scenario, Report, Scenario, Step};

/// Animation-frame cadence while the page is visible
pub const FRAME_INTERVAL_MS: u64 = 16;

/// Blueprint for a video element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSpec {
    pub rect: Rect,
    pub paused: bool,
    pub ready_state: ReadyState,
    pub looping: bool,
    pub player_hint: bool,
    /// The browser's autoplay policy rejects play() calls on this element
    pub autoplay_blocked: bool,
}

impl Default for VideoSpec {
    fn default() -> Self {
        Self {
            rect: Rect::new(0.0, 0.0, 640.0, 360.0),
            paused: true,
            ready_state: ReadyState::HaveEnoughData,
            looping: false,
            player_hint: false,
            autoplay_blocked: false,
        }
    }
}

impl VideoSpec {
    /// A playing main-player element filling most of the viewport
    pub fn playing_main() -> Self {
        Self {
            rect: Rect::new(0.0, 0.0, 1280.0, 720.0),
            paused: false,
            player_hint: true,
            ..Default::default()
        }
    }

    /// A small paused element, e.g. an inline preview
    pub fn paused_thumbnail() -> Self {
        Self {
            rect: Rect::new(900.0, 500.0, 160.0, 90.0),
            ..Default::default()
        }
    }
}

/// One guard-issued resume call as the page observed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub at_ms: u64,
    pub video: VideoId,
    pub reason: ResumeReason,
    /// Rejected by the autoplay policy; the guard never learns about this
    pub blocked: bool,
}

/// Host-page behavior as data: what a registered listener or scheduled
/// callback does when it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "snake_case")]
pub enum HostReaction {
    /// Call the (intercepted) pause entry point
    PauseVideo { video: VideoId },
    /// Call native play
    PlayVideo { video: VideoId },
    /// Detach the element from the document
    RemoveVideo { video: VideoId },
    /// Append a line to the host log; used to assert handler ordering
    Note { text: String },
    /// Run `then` after `ms` milliseconds
    ScheduleAfter { ms: u64, then: Box<HostReaction> },
}

#[derive(Debug)]
struct VideoNode {
    id: VideoId,
    rect: Rect,
    paused: bool,
    ready_state: ReadyState,
    ended: bool,
    looping: bool,
    player_hint: bool,
    autoplay_blocked: bool,
    connected: bool,
}

impl VideoNode {
    fn observe(&self) -> VideoObservation {
        VideoObservation {
            id: self.id,
            rect: self.rect,
            paused: self.paused,
            ready_state: self.ready_state,
            connected: self.connected,
            player_hint: self.player_hint,
            looping: self.looping,
        }
    }
}

#[derive(Debug)]
struct MediaListener {
    id: u64,
    video: VideoId,
    kind: MediaEventKind,
    options: ListenerOptions,
    reaction: HostReaction,
    /// Present when the guard wrapped this registration
    wrapped: bool,
}

#[derive(Debug)]
struct HostTask {
    due_at: u64,
    order: u64,
    reaction: HostReaction,
}

/// The simulated page
pub struct SimPage {
    viewport: Viewport,
    now_ms: u64,
    visible: bool,
    url: String,
    videos: Vec<VideoNode>,
    next_video_id: u64,
    guard: Option<GuardController>,
    /// The prototype pause slot: installed once, then locked
    slot_locked: bool,
    key_listeners: Vec<(u64, HostReaction)>,
    media_listeners: Vec<MediaListener>,
    next_listener_id: u64,
    host_tasks: Vec<HostTask>,
    next_task_order: u64,
    next_frame_at: u64,
    resume_log: Vec<ResumeRecord>,
    host_log: Vec<(u64, String)>,
    /// Queued dispatches while one is in flight, keeping re-entrancy flat
    dispatch_depth: u32,
    deferred: VecDeque<(VideoId, MediaEventKind)>,
}

impl Default for SimPage {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPage {
    pub fn new() -> Self {
        Self {
            viewport: Viewport::default(),
            now_ms: 0,
            visible: true,
            url: "https://www.youtube.com/watch?v=init".to_string(),
            videos: Vec::new(),
            next_video_id: 1,
            guard: None,
            slot_locked: false,
            key_listeners: Vec::new(),
            media_listeners: Vec::new(),
            next_listener_id: 1,
            host_tasks: Vec::new(),
            next_task_order: 0,
            next_frame_at: FRAME_INTERVAL_MS,
            resume_log: Vec::new(),
            host_log: Vec::new(),
            dispatch_depth: 0,
            deferred: VecDeque::new(),
        }
    }

    /// Build a page from HTML fixture markup. Video geometry and media state
    /// are carried in `data-*` attributes:
    ///
    /// ```html
    /// <video data-left="0" data-top="0" data-width="1280" data-height="720"
    ///        data-playing data-main></video>
    /// ```
    ///
    /// Recognized flags: `data-playing`, `data-main`, `data-loop`,
    /// `data-autoplay-blocked`; `data-ready` takes the numeric readyState.
    pub fn from_html(html: &str) -> Result<Self> {
        let doc = scraper::Html::parse_document(html);
        let selector = scraper::Selector::parse("video")
            .map_err(|e| Error::FixtureError(format!("bad selector: {e:?}")))?;
        let mut page = Self::new();
        for el in doc.select(&selector) {
            let attr_f64 = |name: &str| -> f64 {
                el.value()
                    .attr(name)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.0)
            };
            let ready = match el.value().attr("data-ready").and_then(|v| v.parse::<u8>().ok()) {
                Some(0) => ReadyState::HaveNothing,
                Some(1) => ReadyState::HaveMetadata,
                Some(2) => ReadyState::HaveCurrentData,
                Some(3) => ReadyState::HaveFutureData,
                _ => ReadyState::HaveEnoughData,
            };
            page.append_video(VideoSpec {
                rect: Rect::new(
                    attr_f64("data-left"),
                    attr_f64("data-top"),
                    attr_f64("data-width"),
                    attr_f64("data-height"),
                ),
                paused: el.value().attr("data-playing").is_none(),
                ready_state: ready,
                looping: el.value().attr("data-loop").is_some(),
                player_hint: el.value().attr("data-main").is_some(),
                autoplay_blocked: el.value().attr("data-autoplay-blocked").is_some(),
            });
        }
        Ok(page)
    }

    // ---- Guard attachment ----

    /// Install the guard: the capture keydown hook, the document-level media
    /// hooks, navigation hooks, and the pause-interception slot. The slot is
    /// locked after the first install; a second attach in the same
    /// page/frame is rejected.
    pub fn attach_guard(&mut self, policy: GuardPolicy) -> Result<()> {
        if self.slot_locked {
            log::warn!("pause slot already locked; refusing second guard install");
            if let Some(g) = self.guard.as_mut() {
                g.trace_install_rejected(self.now_ms);
            }
            return Err(Error::AlreadyAttached("pause slot is locked".into()));
        }
        self.slot_locked = true;
        let mut guard = GuardController::new(policy);
        guard.attached(self.now_ms);
        self.guard = Some(guard);
        Ok(())
    }

    pub fn guard_attached(&self) -> bool {
        self.guard.is_some()
    }

    // ---- Inspection ----

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn is_paused(&self, video: VideoId) -> bool {
        self.node(video).map(|n| n.paused).unwrap_or(true)
    }

    pub fn is_connected(&self, video: VideoId) -> bool {
        self.node(video).map(|n| n.connected).unwrap_or(false)
    }

    pub fn resume_log(&self) -> &[ResumeRecord] {
        &self.resume_log
    }

    pub fn resumes_for(&self, video: VideoId) -> usize {
        self.resume_log.iter().filter(|r| r.video == video).count()
    }

    pub fn host_log(&self) -> &[(u64, String)] {
        &self.host_log
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.guard.as_ref().map(|g| g.trace())
    }

    pub fn controller(&self) -> Option<&GuardController> {
        self.guard.as_ref()
    }

    pub fn snapshot(&self) -> PageSnapshot {
        PageSnapshot {
            viewport: self.viewport,
            videos: self.videos.iter().map(|n| n.observe()).collect(),
        }
    }

    // ---- Element lifecycle ----

    pub fn append_video(&mut self, spec: VideoSpec) -> VideoId {
        let id = VideoId(self.next_video_id);
        self.next_video_id += 1;
        self.videos.push(VideoNode {
            id,
            rect: spec.rect,
            paused: spec.paused,
            ready_state: spec.ready_state,
            ended: false,
            looping: spec.looping,
            player_hint: spec.player_hint,
            autoplay_blocked: spec.autoplay_blocked,
            connected: true,
        });
        self.notify_mutation();
        id
    }

    pub fn remove_video(&mut self, video: VideoId) {
        if let Some(n) = self.node_mut(video) {
            n.connected = false;
        }
        self.notify_mutation();
    }

    pub fn set_rect(&mut self, video: VideoId, rect: Rect) {
        if let Some(n) = self.node_mut(video) {
            n.rect = rect;
        }
    }

    pub fn set_autoplay_blocked(&mut self, video: VideoId, blocked: bool) {
        if let Some(n) = self.node_mut(video) {
            n.autoplay_blocked = blocked;
        }
    }

    /// Enough data buffered; fires `canplay`
    pub fn buffer_ready(&mut self, video: VideoId) {
        if let Some(n) = self.node_mut(video) {
            n.ready_state = ReadyState::HaveEnoughData;
        }
        self.dispatch_media_event(video, MediaEventKind::CanPlay);
    }

    /// Natural end of playback. Looping elements restart silently; everyone
    /// else pauses and fires `pause` then `ended`, as browsers do.
    pub fn end_video(&mut self, video: VideoId) {
        let Some(n) = self.node_mut(video) else { return };
        if n.looping {
            return;
        }
        let was_playing = !n.paused;
        n.paused = true;
        n.ended = true;
        if was_playing {
            self.dispatch_media_event(video, MediaEventKind::Pause);
        }
        self.dispatch_media_event(video, MediaEventKind::Ended);
    }

    // ---- Host-page listeners ----

    /// Register a host keydown handler (bubble phase; the guard's capture
    /// hook always runs first)
    pub fn add_keydown_reaction(&mut self, reaction: HostReaction) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.key_listeners.push((id, reaction));
        id
    }

    /// Register a host media listener on a video element. Pause-like kinds
    /// go through the guard's listener-wrapping layer when one is attached.
    pub fn add_media_listener(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        options: ListenerOptions,
        reaction: HostReaction,
    ) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        let wrapped = self
            .guard
            .as_mut()
            .and_then(|g| g.wrap_listener(video, kind, id, options))
            .is_some();
        self.media_listeners.push(MediaListener { id, video, kind, options, reaction, wrapped });
        id
    }

    /// Mirror of `removeEventListener`: the same (element, kind, listener,
    /// options) key removes both the host listener and its wrapper. Unknown
    /// keys are a silent no-op.
    pub fn remove_media_listener(
        &mut self,
        video: VideoId,
        kind: MediaEventKind,
        listener: u64,
        options: ListenerOptions,
    ) {
        if let Some(g) = self.guard.as_mut() {
            g.unwrap_listener(video, kind, listener, options);
        }
        self.media_listeners.retain(|l| {
            !(l.video == video && l.kind == kind && l.id == listener && l.options == options)
        });
    }

    // ---- User/page actions ----

    /// Dispatch a keydown. The guard's capture hook snapshots state before
    /// any host handler reacts.
    pub fn press_key(&mut self, press: KeyPress) {
        let actions = self.guard_call(|g, now, view| g.on_keydown(&press, now, view));
        self.apply_actions(actions);
        let reactions: Vec<HostReaction> =
            self.key_listeners.iter().map(|(_, r)| r.clone()).collect();
        for r in reactions {
            self.run_reaction(r);
        }
        self.microtask_checkpoint();
    }

    /// Call the pause entry point on a video: the path the host page and
    /// its scripts use, routed through the interception slot
    pub fn call_pause(&mut self, video: VideoId) {
        if self.guard.is_none() {
            self.native_pause(video);
            self.microtask_checkpoint();
            return;
        }
        let (verdict, actions) =
            self.guard_call_pair(|g, now, view| g.intercepted_pause(video, now, view));
        self.apply_actions(actions);
        match verdict {
            PauseVerdict::Proceed => self.native_pause(video),
            PauseVerdict::Suppress => {}
        }
        self.microtask_checkpoint();
    }

    /// A pause that bypasses the intercepted method entirely, e.g. a
    /// user-agent-internal pause. Only the event-level safety net sees it.
    pub fn ua_pause(&mut self, video: VideoId) {
        self.native_pause(video);
        self.microtask_checkpoint();
    }

    /// Dispatch a bare media event without changing element state
    /// (suspend/stalled/waiting simulation)
    pub fn ua_event(&mut self, video: VideoId, kind: MediaEventKind) {
        self.dispatch_media_event(video, kind);
        self.microtask_checkpoint();
    }

    pub fn navigate_start(&mut self, url: &str) {
        self.url = url.to_string();
        let signal = NavigationSignal::Started;
        let actions = self.guard_call(|g, now, view| g.on_navigation(&signal, now, view));
        self.apply_actions(actions);
        self.microtask_checkpoint();
    }

    pub fn navigate_finish(&mut self) {
        let signal = NavigationSignal::Finished;
        let actions = self.guard_call(|g, now, view| g.on_navigation(&signal, now, view));
        self.apply_actions(actions);
        self.microtask_checkpoint();
    }

    pub fn history_push(&mut self, url: &str) {
        self.url = url.to_string();
        let signal = NavigationSignal::HistoryChanged { url: url.to_string() };
        let actions = self.guard_call(|g, now, view| g.on_navigation(&signal, now, view));
        self.apply_actions(actions);
        self.microtask_checkpoint();
    }

    pub fn playlist_click(&mut self) {
        let signal = NavigationSignal::PlaylistClick;
        let actions = self.guard_call(|g, now, view| g.on_navigation(&signal, now, view));
        self.apply_actions(actions);
        self.microtask_checkpoint();
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        if visible {
            self.next_frame_at = self.now_ms + FRAME_INTERVAL_MS;
        }
        if let Some(g) = self.guard.as_mut() {
            g.on_visibility(visible, self.now_ms);
        }
        self.microtask_checkpoint();
    }

    // ---- Virtual clock ----

    pub fn advance(&mut self, ms: u64) {
        self.advance_to(self.now_ms + ms);
    }

    /// Run the page forward to `target_ms`, firing host tasks, guard timers
    /// and animation frames in deadline order. Targets in the past are
    /// clamped; the clock never moves backward.
    pub fn advance_to(&mut self, target_ms: u64) {
        let target_ms = target_ms.max(self.now_ms);
        while let Some(next) = self.next_wake(target_ms) {
            self.now_ms = next;
            // Host-scheduled callbacks first
            let due = self.take_due_host_tasks();
            for r in due {
                self.run_reaction(r);
            }
            // Guard timers
            let actions = self.guard_call(|g, now, view| g.run_due(now, view));
            self.apply_actions(actions);
            self.microtask_checkpoint();
            // Animation frame (only while visible)
            if self.visible && self.now_ms >= self.next_frame_at {
                let actions = self.guard_call(|g, now, view| g.on_frame(now, view));
                self.apply_actions(actions);
                self.microtask_checkpoint();
                self.next_frame_at = self.now_ms + FRAME_INTERVAL_MS;
            }
        }
        self.now_ms = target_ms;
    }

    /// Run until neither the host nor the guard has pending timers
    pub fn flush(&mut self) {
        loop {
            let host = self.host_tasks.iter().map(|t| t.due_at).min();
            let guard = self.guard.as_ref().and_then(|g| g.next_deadline());
            let Some(next) = [host, guard].into_iter().flatten().min() else { break };
            self.advance_to(next.max(self.now_ms));
        }
    }

    // ---- Internals ----

    fn next_wake(&self, target_ms: u64) -> Option<u64> {
        let host = self.host_tasks.iter().map(|t| t.due_at).min();
        let guard = self.guard.as_ref().and_then(|g| g.next_deadline());
        let frame = self.visible.then_some(self.next_frame_at);
        [host, guard, frame]
            .into_iter()
            .flatten()
            .filter(|&t| t <= target_ms)
            .min()
            .map(|t| t.max(self.now_ms))
    }

    fn take_due_host_tasks(&mut self) -> Vec<HostReaction> {
        let now = self.now_ms;
        let mut due: Vec<HostTask> = Vec::new();
        let mut rest: Vec<HostTask> = Vec::new();
        for t in self.host_tasks.drain(..) {
            if t.due_at <= now {
                due.push(t);
            } else {
                rest.push(t);
            }
        }
        self.host_tasks = rest;
        due.sort_by_key(|t| (t.due_at, t.order));
        due.into_iter().map(|t| t.reaction).collect()
    }

    fn schedule_host_task(&mut self, ms: u64, reaction: HostReaction) {
        let order = self.next_task_order;
        self.next_task_order += 1;
        self.host_tasks.push(HostTask { due_at: self.now_ms + ms, order, reaction });
    }

    fn run_reaction(&mut self, reaction: HostReaction) {
        match reaction {
            HostReaction::PauseVideo { video } => self.call_pause(video),
            HostReaction::PlayVideo { video } => self.native_play(video, None),
            HostReaction::RemoveVideo { video } => self.remove_video(video),
            HostReaction::Note { text } => self.host_log.push((self.now_ms, text)),
            HostReaction::ScheduleAfter { ms, then } => self.schedule_host_task(ms, *then),
        }
    }

    fn node(&self, video: VideoId) -> Option<&VideoNode> {
        self.videos.iter().find(|n| n.id == video)
    }

    fn node_mut(&mut self, video: VideoId) -> Option<&mut VideoNode> {
        self.videos.iter_mut().find(|n| n.id == video)
    }

    /// The un-intercepted pause: flips state and fires the event
    fn native_pause(&mut self, video: VideoId) {
        let Some(n) = self.node_mut(video) else { return };
        if n.paused {
            return;
        }
        n.paused = true;
        self.dispatch_media_event(video, MediaEventKind::Pause);
    }

    /// The un-intercepted play. `reason` is present for guard-issued
    /// resumes, which are logged; host-initiated plays are not.
    fn native_play(&mut self, video: VideoId, reason: Option<ResumeReason>) {
        let Some(n) = self.node_mut(video) else { return };
        if !n.connected {
            return;
        }
        // Rejection is the host's secret; the guard just retries later
        let blocked = n.autoplay_blocked;
        let resumed = !blocked && n.paused;
        if resumed {
            n.paused = false;
            n.ended = false;
        }
        if let Some(reason) = reason {
            let at_ms = self.now_ms;
            self.resume_log.push(ResumeRecord { at_ms, video, reason, blocked });
        }
        if resumed {
            self.dispatch_media_event(video, MediaEventKind::Playing);
        }
    }

    /// Capture (guard safety net) → target (host listeners, wrapped ones
    /// notifying the guard afterwards) → microtask checkpoint
    fn dispatch_media_event(&mut self, video: VideoId, kind: MediaEventKind) {
        // Serialize nested dispatches from re-entrant reactions
        if self.dispatch_depth > 0 {
            self.deferred.push_back((video, kind));
            return;
        }
        self.dispatch_depth += 1;
        self.dispatch_one(video, kind);
        while let Some((v, k)) = self.deferred.pop_front() {
            self.dispatch_one(v, k);
        }
        self.dispatch_depth -= 1;
        self.microtask_checkpoint();
    }

    fn dispatch_one(&mut self, video: VideoId, kind: MediaEventKind) {
        let actions = self.guard_call(|g, now, view| g.on_media_event(video, kind, now, view));
        self.apply_actions(actions);

        // Target phase: host listeners in registration order
        let matching: Vec<(u64, ListenerOptions, HostReaction, bool)> = self
            .media_listeners
            .iter()
            .filter(|l| l.video == video && l.kind == kind)
            .map(|l| (l.id, l.options, l.reaction.clone(), l.wrapped))
            .collect();
        for (id, options, reaction, wrapped) in matching {
            self.run_reaction(reaction);
            if wrapped {
                let now = self.now_ms;
                if let Some(g) = self.guard.as_mut() {
                    g.after_wrapped_listener(video, kind, now);
                }
            }
            if options.once {
                self.remove_media_listener(video, kind, id, options);
            }
        }
    }

    /// Drain guard microtasks, applying any resumes they emit. Runs after
    /// every dispatched task, like the real microtask checkpoint.
    fn microtask_checkpoint(&mut self) {
        if self.dispatch_depth > 0 {
            return;
        }
        loop {
            let pending = self.guard.as_ref().is_some_and(|g| g.has_pending_microtasks());
            if !pending {
                break;
            }
            let actions = self.guard_call(|g, now, view| g.drain_microtasks(now, view));
            self.apply_actions(actions);
        }
    }

    fn apply_actions(&mut self, actions: Vec<GuardAction>) {
        for action in actions {
            match action {
                GuardAction::Resume { video, reason } => self.native_play(video, Some(reason)),
            }
        }
    }

    fn notify_mutation(&mut self) {
        let now = self.now_ms;
        let view = self.snapshot();
        if let Some(g) = self.guard.as_mut() {
            g.on_mutation(now, &view);
        }
    }

    fn guard_call<F>(&mut self, f: F) -> Vec<GuardAction>
    where
        F: FnOnce(&mut GuardController, u64, &PageSnapshot) -> Vec<GuardAction>,
    {
        let Some(mut g) = self.guard.take() else { return Vec::new() };
        let view = self.snapshot();
        let actions = f(&mut g, self.now_ms, &view);
        self.guard = Some(g);
        actions
    }

    fn guard_call_pair<F>(&mut self, f: F) -> (PauseVerdict, Vec<GuardAction>)
    where
        F: FnOnce(&mut GuardController, u64, &PageSnapshot) -> (PauseVerdict, Vec<GuardAction>),
    {
        let Some(mut g) = self.guard.take() else {
            return (PauseVerdict::Proceed, Vec::new());
        };
        let view = self.snapshot();
        let out = f(&mut g, self.now_ms, &view);
        self.guard = Some(g);
        out
    }
}
