//! Trigger and enforcement behavior on the simulated page

use playguard::media::{KeyPress, KeyTarget, MediaEventKind};
use playguard::sim::{SimPage, VideoSpec};
use playguard::trace::{ResumeReason, TraceEvent};
use playguard::windows::WindowKind;
use playguard::{GuardPolicy, InterceptStyle};

fn guarded_page() -> (SimPage, playguard::VideoId) {
    let mut page = SimPage::new();
    let v = page.append_video(VideoSpec::playing_main());
    page.attach_guard(GuardPolicy::default()).expect("attach");
    (page, v)
}

#[test]
fn paused_snapshot_never_resumes() {
    let mut page = SimPage::new();
    let v = page.append_video(VideoSpec::default()); // paused
    page.attach_guard(GuardPolicy::default()).unwrap();
    page.press_key(KeyPress::bare("i"));
    page.advance(3000);
    assert!(page.is_paused(v));
    assert!(page.resume_log().is_empty());
    assert!(!page.controller().unwrap().windows().any_open(page.now()));
}

#[test]
fn editable_focus_never_triggers() {
    let (mut page, v) = guarded_page();
    let mut press = KeyPress::bare("i");
    press.target = Some(KeyTarget { tag: "input".into(), ..Default::default() });
    page.press_key(press);
    page.call_pause(v);
    page.advance(500);
    assert!(page.is_paused(v));
    assert!(page.resume_log().is_empty());
}

#[test]
fn method_pause_inside_window_is_undone_within_a_tick() {
    let (mut page, v) = guarded_page();
    page.press_key(KeyPress::bare("i"));
    page.advance(50);
    page.call_pause(v);
    // One immediate enforcement; the burst finds the video already playing
    assert!(!page.is_paused(v));
    page.advance(250);
    assert_eq!(page.resumes_for(v), 1);
    assert!(page
        .resume_log()
        .iter()
        .all(|r| r.reason == ResumeReason::PauseEnforcement));
    // Enforcement micro-extends the key window
    let extends = page
        .trace()
        .unwrap()
        .events
        .iter()
        .filter(|e| matches!(e, TraceEvent::WindowExtended { kind: WindowKind::Key, .. }))
        .count();
    assert!(extends >= 2, "trigger open + micro-extend, saw {extends}");
}

#[test]
fn ua_pause_is_caught_by_the_event_safety_net() {
    let (mut page, v) = guarded_page();
    page.press_key(KeyPress::bare("i"));
    page.advance(100);
    // Bypasses the intercepted method entirely
    page.ua_pause(v);
    assert!(!page.is_paused(v));
    assert_eq!(page.resumes_for(v), 1);
}

#[test]
fn pause_after_window_expiry_stays_paused() {
    let (mut page, v) = guarded_page();
    page.press_key(KeyPress::bare("i"));
    page.advance(2000); // key window (1500ms) has lapsed
    page.call_pause(v);
    page.advance(1000);
    assert!(page.is_paused(v));
    assert!(page.resume_log().is_empty());
}

#[test]
fn pause_without_any_trigger_passes_through() {
    let (mut page, v) = guarded_page();
    page.call_pause(v);
    page.advance(500);
    assert!(page.is_paused(v));
    assert!(page.resume_log().is_empty());
}

#[test]
fn host_keydown_reaction_races_and_loses() {
    // The host page pauses in its own keydown handler; the guard's capture
    // snapshot ran first, so the pause is neutralized
    let (mut page, v) = guarded_page();
    page.add_keydown_reaction(playguard::sim::HostReaction::PauseVideo { video: v });
    page.press_key(KeyPress::bare("i"));
    page.advance(300);
    assert!(!page.is_paused(v));
    assert!(page.resumes_for(v) >= 1);
}

#[test]
fn delayed_host_pause_is_covered_by_the_window() {
    // Host reacts to the key 50ms later, as the miniplayer transition does
    let (mut page, v) = guarded_page();
    page.add_keydown_reaction(playguard::sim::HostReaction::ScheduleAfter {
        ms: 50,
        then: Box::new(playguard::sim::HostReaction::PauseVideo { video: v }),
    });
    page.press_key(KeyPress::bare("i"));
    page.advance(1000);
    assert!(!page.is_paused(v));
    assert_eq!(page.resumes_for(v), 1);
}

#[test]
fn suppress_style_swallows_the_pause() {
    let mut page = SimPage::new();
    let v = page.append_video(VideoSpec::playing_main());
    let policy = GuardPolicy { intercept_style: InterceptStyle::Suppress, ..Default::default() };
    page.attach_guard(policy).unwrap();
    page.press_key(KeyPress::bare("i"));
    page.advance(50);
    page.call_pause(v);
    // Never paused at all: the native pause was skipped
    assert!(!page.is_paused(v));
    assert!(page
        .resume_log()
        .iter()
        .any(|r| r.reason == ResumeReason::SuppressedPause));
    assert!(page
        .trace()
        .unwrap()
        .events
        .iter()
        .any(|e| matches!(e, TraceEvent::PauseSuppressed { .. })));
}

#[test]
fn autoplay_rejection_is_swallowed_and_retried() {
    let (mut page, v) = guarded_page();
    page.set_autoplay_blocked(v, true);
    page.press_key(KeyPress::bare("i"));
    page.advance(100);
    page.ua_pause(v);
    page.advance(400);
    // Still paused: every play call was rejected; the guard kept retrying
    // through ticks and frames without ever surfacing an error
    assert!(page.is_paused(v));
    let blocked = page.resume_log().iter().filter(|r| r.blocked).count();
    assert!(blocked >= 2, "expected retries, saw {blocked}");
}

#[test]
fn stall_events_on_a_blocked_video_keep_enforcing() {
    let (mut page, v) = guarded_page();
    page.set_autoplay_blocked(v, true);
    page.press_key(KeyPress::bare("i"));
    page.advance(100);
    page.ua_pause(v);
    let before = page.resumes_for(v);
    page.ua_event(v, MediaEventKind::Waiting);
    assert!(page.resumes_for(v) > before);
}

#[test]
fn repeated_pauses_get_one_enforcement_each() {
    let (mut page, v) = guarded_page();
    page.press_key(KeyPress::bare("i"));
    for at in [100u64, 400, 700] {
        page.advance_to(at);
        page.call_pause(v);
        assert!(!page.is_paused(v));
    }
    page.advance(300);
    assert_eq!(page.resumes_for(v), 3);
}
