//! Visibility transitions and the key-combo policy

use playguard::media::KeyPress;
use playguard::sim::{SimPage, VideoSpec};
use playguard::windows::WindowKind;
use playguard::{ComboPolicy, GuardPolicy};

#[test]
fn hiding_the_page_drops_the_gesture_windows() {
    let mut page = SimPage::new();
    let v = page.append_video(VideoSpec::playing_main());
    page.attach_guard(GuardPolicy::default()).unwrap();
    page.press_key(KeyPress::bare("i"));
    page.advance(100);

    page.set_visible(false);
    assert!(!page.controller().unwrap().windows().is_open(WindowKind::Key, page.now()));

    // A pause while hidden is no longer protected
    page.advance(100);
    page.call_pause(v);
    page.advance(500);
    assert!(page.is_paused(v));
    assert!(page.resume_log().is_empty());
}

#[test]
fn handoff_survives_hiding() {
    let mut page = SimPage::new();
    let old = page.append_video(VideoSpec::playing_main());
    page.attach_guard(GuardPolicy::default()).unwrap();
    page.end_video(old);
    page.remove_video(old);

    // Tab hidden while the playlist advances in the background
    page.set_visible(false);
    assert!(page
        .controller()
        .unwrap()
        .windows()
        .is_open(WindowKind::Handoff, page.now()));
    page.advance(1000);

    page.set_visible(true);
    let fresh = page.append_video(VideoSpec::default());
    page.buffer_ready(fresh);
    assert!(!page.is_paused(fresh));
}

#[test]
fn guard_loop_suspends_while_hidden_and_rearms() {
    let mut page = SimPage::new();
    let v = page.append_video(VideoSpec::playing_main());
    page.attach_guard(GuardPolicy::default()).unwrap();
    // Handoff keeps a window open across the hide
    page.end_video(v);
    page.set_visible(false);
    // Drain: the tick unarms itself while hidden instead of rescheduling
    page.advance(2000);
    assert_eq!(page.controller().unwrap().next_deadline(), None);

    page.set_visible(true);
    // Still inside the handoff window: the loop re-armed
    assert!(page.controller().unwrap().next_deadline().is_some());
}

#[test]
fn combo_press_broadens_protection_to_all_videos() {
    let mut page = SimPage::new();
    let main = page.append_video(VideoSpec::playing_main());
    let thumb = page.append_video(VideoSpec::paused_thumbnail());
    page.attach_guard(GuardPolicy::default()).unwrap();

    page.press_key(KeyPress::bare("i"));
    page.advance(400);
    page.press_key(KeyPress::bare("i"));
    assert!(page
        .controller()
        .unwrap()
        .windows()
        .is_open(WindowKind::Combo, page.now()));

    // The next frame check resumes every paused video, not just the tracked
    page.advance(100);
    assert!(!page.is_paused(thumb));
    assert!(page.resumes_for(thumb) >= 1);
    assert!(!page.is_paused(main));
}

#[test]
fn combo_disabled_keeps_protection_on_the_tracked_video() {
    let mut page = SimPage::new();
    let _main = page.append_video(VideoSpec::playing_main());
    let thumb = page.append_video(VideoSpec::paused_thumbnail());
    let policy = GuardPolicy {
        combo: ComboPolicy { enabled: false, ..Default::default() },
        ..Default::default()
    };
    page.attach_guard(policy).unwrap();

    page.press_key(KeyPress::bare("i"));
    page.advance(400);
    page.press_key(KeyPress::bare("i"));
    assert!(!page
        .controller()
        .unwrap()
        .windows()
        .is_open(WindowKind::Combo, page.now()));

    page.advance(1000);
    assert!(page.is_paused(thumb));
    assert_eq!(page.resumes_for(thumb), 0);
}

#[test]
fn combo_window_expires_on_schedule() {
    let mut page = SimPage::new();
    let _main = page.append_video(VideoSpec::playing_main());
    let thumb = page.append_video(VideoSpec::paused_thumbnail());
    page.attach_guard(GuardPolicy::default()).unwrap();

    page.press_key(KeyPress::bare("i"));
    page.advance(400);
    page.press_key(KeyPress::bare("i"));
    // Let the combo window (3000ms from the second press) lapse
    page.advance(4000);

    // Combo protection has already resumed the thumbnail once; pause it
    // again now that all windows are closed
    page.call_pause(thumb);
    page.advance(500);
    assert!(page.is_paused(thumb));
}
