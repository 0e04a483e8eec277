use criterion::{criterion_group, criterion_main, Criterion};

use playguard::media::{KeyPress, ReadyState, Rect, VideoId, VideoObservation};
use playguard::selector::pick_main_video;
use playguard::sim::{SimPage, VideoSpec};
use playguard::{GuardPolicy, Viewport};

/// Bench: main-video selection over a crowded page
fn bench_selector(c: &mut Criterion) {
    let viewport = Viewport::default();
    let videos: Vec<VideoObservation> = (0u64..200)
        .map(|i| VideoObservation {
            id: VideoId(i + 1),
            rect: Rect::new((i % 20) as f64 * 80.0, (i / 20) as f64 * 80.0, 160.0, 90.0),
            paused: i % 3 != 0,
            ready_state: ReadyState::HaveEnoughData,
            connected: true,
            player_hint: false,
            looping: false,
        })
        .collect();

    c.bench_function("pick_main_video_200", |b| {
        b.iter(|| {
            let _ = pick_main_video(viewport, &videos);
        })
    });
}

/// Bench: a full protection cycle on the simulated page, trigger through
/// enforcement and window expiry
fn bench_guard_cycle(c: &mut Criterion) {
    c.bench_function("guard_cycle", |b| {
        b.iter(|| {
            let mut page = SimPage::new();
            let v = page.append_video(VideoSpec::playing_main());
            page.attach_guard(GuardPolicy::default()).expect("attach");
            page.press_key(KeyPress::bare("i"));
            page.call_pause(v);
            page.advance(2000);
            assert!(!page.is_paused(v));
        })
    });
}

/// Bench: pumping the guard loop over a long idle window
fn bench_idle_ticks(c: &mut Criterion) {
    let mut page = SimPage::new();
    page.append_video(VideoSpec::playing_main());
    page.attach_guard(GuardPolicy::default()).expect("attach");
    page.press_key(KeyPress::bare("i"));

    c.bench_function("advance_1s", |b| {
        b.iter(|| {
            page.advance(1000);
        })
    });
}

criterion_group!(benches, bench_selector, bench_guard_cycle, bench_idle_ticks);
criterion_main!(benches);
