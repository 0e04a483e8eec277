//! Walkthrough of the guard on a simulated watch page: miniplayer-key
//! transition, a host pause race, and a playlist-advance handoff.
//! Run with: cargo run --example miniplayer_guard

use playguard::media::KeyPress;
use playguard::sim::{HostReaction, SimPage, VideoSpec};
use playguard::GuardPolicy;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut page = SimPage::new();
    let main = page.append_video(VideoSpec::playing_main());
    page.append_video(VideoSpec::paused_thumbnail());
    page.attach_guard(GuardPolicy::default())?;

    // The host page pauses the player 50ms after the miniplayer key, as the
    // real transition code does.
    page.add_keydown_reaction(HostReaction::ScheduleAfter {
        ms: 50,
        then: Box::new(HostReaction::PauseVideo { video: main }),
    });

    println!("pressing '{}' at {}ms", "i", page.now());
    page.press_key(KeyPress::bare("i"));
    page.advance(500);
    println!(
        "after the transition: main paused = {}, resumes so far = {}",
        page.is_paused(main),
        page.resume_log().len()
    );

    // A pause arriving outside any window passes through untouched
    page.advance(2000);
    page.call_pause(main);
    page.advance(100);
    println!("unprotected pause sticks: main paused = {}", page.is_paused(main));

    // Playlist advance: old element ends, a fresh one replaces it
    page.end_video(main);
    page.remove_video(main);
    let next = page.append_video(VideoSpec::default());
    page.advance(300);
    page.buffer_ready(next);
    page.advance(300);
    println!(
        "after the handoff: next paused = {}, resumes total = {}",
        page.is_paused(next),
        page.resume_log().len()
    );

    for record in page.resume_log() {
        println!(
            "  resume @{}ms {} ({:?}){}",
            record.at_ms,
            record.video,
            record.reason,
            if record.blocked { " [blocked]" } else { "" }
        );
    }

    Ok(())
}
