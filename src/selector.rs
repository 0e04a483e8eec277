//! Main-video selection heuristic
//!
//! A page may contain several video elements (inline previews, ads, the
//! actual player). The guard tracks exactly one of them; this module picks
//! which. An element carrying the host's main-player hint wins outright;
//! otherwise every connected element is scored by geometry and playback
//! state and the highest score wins, with ties resolving to encounter order.

use crate::media::{VideoObservation, PageView};
use crate::Viewport;

/// Weight added when the element intersects the viewport
const VISIBLE_BONUS: f64 = 1e6;
/// Weight added when the element is currently playing
const PLAYING_BONUS: f64 = 5e5;
/// Weight added when enough data is buffered to play
const PLAYABLE_BONUS: f64 = 2e5;

/// Score one element. Deterministic for identical geometry/state inputs.
pub fn score(video: &VideoObservation, viewport: Viewport) -> f64 {
    let mut s = video.rect.area();
    if video.rect.visible_in(viewport) {
        s += VISIBLE_BONUS;
    }
    if video.playing() {
        s += PLAYING_BONUS;
    }
    if video.ready_state.playable() {
        s += PLAYABLE_BONUS;
    }
    s
}

/// Pick the user-facing player among `videos`, or `None` when no connected
/// video exists. `videos` must be in encounter (document) order.
pub fn pick_main_video(viewport: Viewport, videos: &[VideoObservation]) -> Option<VideoObservation> {
    let mut best: Option<(&VideoObservation, f64)> = None;
    for v in videos.iter().filter(|v| v.connected) {
        if v.player_hint {
            return Some(v.clone());
        }
        let s = score(v, viewport);
        // Strict comparison keeps the first-encountered element on ties
        match best {
            Some((_, bs)) if s <= bs => {}
            _ => best = Some((v, s)),
        }
    }
    best.map(|(v, _)| v.clone())
}

/// Convenience wrapper querying a live view
pub fn pick_from(view: &dyn PageView) -> Option<VideoObservation> {
    pick_main_video(view.viewport(), &view.videos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ReadyState, Rect, VideoId};

    fn obs(id: u64, rect: Rect) -> VideoObservation {
        VideoObservation {
            id: VideoId(id),
            rect,
            paused: true,
            ready_state: ReadyState::HaveNothing,
            connected: true,
            player_hint: false,
            looping: false,
        }
    }

    fn vp() -> Viewport {
        Viewport { width: 1280, height: 720 }
    }

    #[test]
    fn empty_set_yields_none() {
        assert_eq!(pick_main_video(vp(), &[]), None);
    }

    #[test]
    fn larger_visible_element_wins() {
        let small = obs(1, Rect::new(0.0, 0.0, 100.0, 100.0));
        let large = obs(2, Rect::new(0.0, 0.0, 800.0, 450.0));
        let picked = pick_main_video(vp(), &[small, large]).unwrap();
        assert_eq!(picked.id, VideoId(2));
    }

    #[test]
    fn visibility_outweighs_area() {
        // Larger but scrolled entirely off-screen vs smaller on-screen; the
        // visibility weight (1e6) dominates any sub-megapixel area edge
        let offscreen = obs(1, Rect::new(0.0, -5000.0, 640.0, 360.0));
        let onscreen = obs(2, Rect::new(0.0, 0.0, 320.0, 180.0));
        let picked = pick_main_video(vp(), &[offscreen, onscreen]).unwrap();
        assert_eq!(picked.id, VideoId(2));
    }

    #[test]
    fn megapixel_offscreen_element_can_outscore_visibility() {
        // The weights are additive, not lexicographic: an off-screen element
        // whose raw area exceeds the visibility weight wins on score
        let offscreen = obs(1, Rect::new(0.0, -5000.0, 1920.0, 1080.0));
        let onscreen = obs(2, Rect::new(0.0, 0.0, 320.0, 180.0));
        let picked = pick_main_video(vp(), &[offscreen, onscreen]).unwrap();
        assert_eq!(picked.id, VideoId(1));
    }

    #[test]
    fn playing_breaks_geometry_parity() {
        let a = obs(1, Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut b = obs(2, Rect::new(640.0, 0.0, 640.0, 360.0));
        b.paused = false;
        let picked = pick_main_video(vp(), &[a, b]).unwrap();
        assert_eq!(picked.id, VideoId(2));
    }

    #[test]
    fn buffered_element_beats_unbuffered_peer() {
        let a = obs(1, Rect::new(0.0, 0.0, 640.0, 360.0));
        let mut b = obs(2, Rect::new(640.0, 0.0, 640.0, 360.0));
        b.ready_state = ReadyState::HaveCurrentData;
        let picked = pick_main_video(vp(), &[a, b]).unwrap();
        assert_eq!(picked.id, VideoId(2));
    }

    #[test]
    fn exact_tie_resolves_to_first_encountered() {
        let a = obs(1, Rect::new(0.0, 0.0, 640.0, 360.0));
        let b = obs(2, Rect::new(0.0, 0.0, 640.0, 360.0));
        let picked = pick_main_video(vp(), &[a, b]).unwrap();
        assert_eq!(picked.id, VideoId(1));
    }

    #[test]
    fn player_hint_wins_over_any_score() {
        let mut tiny = obs(1, Rect::new(0.0, -5000.0, 10.0, 10.0));
        tiny.player_hint = true;
        let mut big = obs(2, Rect::new(0.0, 0.0, 1280.0, 720.0));
        big.paused = false;
        big.ready_state = ReadyState::HaveEnoughData;
        let picked = pick_main_video(vp(), &[big, tiny]).unwrap();
        assert_eq!(picked.id, VideoId(1));
    }

    #[test]
    fn detached_elements_are_skipped() {
        let mut gone = obs(1, Rect::new(0.0, 0.0, 1280.0, 720.0));
        gone.connected = false;
        let live = obs(2, Rect::new(0.0, 0.0, 100.0, 100.0));
        let picked = pick_main_video(vp(), &[gone.clone(), live]).unwrap();
        assert_eq!(picked.id, VideoId(2));
        assert_eq!(pick_main_video(vp(), &[gone]), None);
    }
}
