//! Scenario model: JSON round-trips and the runner

use playguard::sim::scenario::{demo_scenario, run_scenario, Scenario};
use playguard::sim::SimPage;

#[test]
fn demo_scenario_guards_the_miniplayer_transition() {
    let report = run_scenario(&demo_scenario()).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
    assert_eq!(report.name, "miniplayer-anti-pause");
    assert!(report.resumes.iter().any(|r| r.video.0 == 1));
    assert_eq!(report.digest.len(), 64);
}

#[test]
fn scenario_runs_from_raw_json() {
    let json = r#"{
        "name": "handoff-from-json",
        "fixture": {
            "html": "<html><body><video data-width=\"1280\" data-height=\"720\" data-playing data-main></video></body></html>"
        },
        "steps": [
            { "at_ms": 100, "step": "end_video", "video": 1 },
            { "at_ms": 200, "step": "remove_video", "video": 1 },
            { "at_ms": 1200, "step": "append_video", "spec": {} },
            { "at_ms": 1300, "step": "buffer_ready", "video": 2 }
        ],
        "settle_ms": 500,
        "expect": {
            "min_resumes": { "2": 1 },
            "finally_paused": { "2": false }
        }
    }"#;
    let scenario = Scenario::from_json(json).unwrap();
    let report = run_scenario(&scenario).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
}

#[test]
fn policy_override_in_scenario_json_applies() {
    let json = r#"{
        "name": "no-protection-with-zero-window",
        "fixture": { "videos": [ { "paused": false, "player_hint": true } ] },
        "policy": { "key_window_ms": 0 },
        "steps": [
            { "at_ms": 100, "step": "press_key", "press": { "key": "i" } },
            { "at_ms": 150, "step": "call_pause", "video": 1 }
        ],
        "settle_ms": 500,
        "expect": { "finally_paused": { "1": true } }
    }"#;
    let scenario = Scenario::from_json(json).unwrap();
    let report = run_scenario(&scenario).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
    assert!(report.resumes.is_empty());
}

#[test]
fn report_serializes_for_the_cli() {
    let report = run_scenario(&demo_scenario()).unwrap();
    let json = serde_json::to_string_pretty(&report).unwrap();
    assert!(json.contains("\"digest\""));
    assert!(json.contains("\"resumes\""));
    let back: playguard::sim::Report = serde_json::from_str(&json).unwrap();
    assert_eq!(back.digest, report.digest);
}

#[test]
fn html_fixture_preserves_document_order() {
    let page = SimPage::from_html(
        r#"<video data-width="100" data-height="100"></video>
           <video data-width="200" data-height="200"></video>
           <video data-width="300" data-height="300"></video>"#,
    )
    .unwrap();
    let snap = page.snapshot();
    let widths: Vec<f64> = snap.videos.iter().map(|v| v.rect.width).collect();
    assert_eq!(widths, vec![100.0, 200.0, 300.0]);
}
