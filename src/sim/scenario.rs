//! Data-driven scenarios
//!
//! A scenario is a JSON description of one page run: a fixture (HTML markup
//! or an element list), an optional policy override, timed steps, and
//! optional expectations. The runner executes it on a [`SimPage`] and
//! returns a [`Report`] with the resume log, the guard's decision trace and
//! its digest.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::media::{KeyPress, MediaEventKind, VideoId};
use crate::sim::{HostReaction, ResumeRecord, SimPage, VideoSpec};
use crate::{Error, GuardPolicy, Result};

/// Page fixture: markup or explicit element list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fixture {
    Html(String),
    Videos(Vec<VideoSpec>),
}

/// One timed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub step: Step,
}

/// Scenario step, mirroring the simulated page's primitives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    PressKey { press: KeyPress },
    CallPause { video: VideoId },
    UaPause { video: VideoId },
    MediaEvent { video: VideoId, kind: MediaEventKind },
    EndVideo { video: VideoId },
    BufferReady { video: VideoId },
    AppendVideo { spec: VideoSpec },
    RemoveVideo { video: VideoId },
    NavigateStart { url: String },
    NavigateFinish,
    HistoryPush { url: String },
    PlaylistClick,
    SetVisible { visible: bool },
    HostListener { video: VideoId, kind: MediaEventKind, reaction: HostReaction },
    KeydownReaction { reaction: HostReaction },
}

/// Expected outcomes, checked after the run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Expectations {
    /// Minimum guard-issued resume calls per video id
    pub min_resumes: BTreeMap<u64, u64>,
    /// Final paused state per video id
    pub finally_paused: BTreeMap<u64, bool>,
}

/// A complete scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub fixture: Fixture,
    #[serde(default)]
    pub policy: Option<GuardPolicy>,
    pub steps: Vec<TimedStep>,
    /// Run this long after the last step
    #[serde(default)]
    pub settle_ms: u64,
    #[serde(default)]
    pub expect: Option<Expectations>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ScenarioError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ScenarioError(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }
}

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    pub resumes: Vec<ResumeRecord>,
    pub trace: serde_json::Value,
    pub digest: String,
    /// Expectation failures; empty means the run passed
    pub failures: Vec<String>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execute a scenario on a fresh simulated page
pub fn run_scenario(scenario: &Scenario) -> Result<Report> {
    let mut page = match &scenario.fixture {
        Fixture::Html(html) => SimPage::from_html(html)?,
        Fixture::Videos(specs) => {
            let mut page = SimPage::new();
            for spec in specs {
                page.append_video(spec.clone());
            }
            page
        }
    };
    page.attach_guard(scenario.policy.clone().unwrap_or_default())?;

    let mut steps = scenario.steps.clone();
    steps.sort_by_key(|s| s.at_ms);
    let mut last_at = 0;
    for TimedStep { at_ms, step } in steps {
        page.advance_to(at_ms.max(page.now()));
        last_at = at_ms;
        apply_step(&mut page, step);
    }
    page.advance_to(last_at + scenario.settle_ms.max(1));

    let trace = page
        .trace()
        .map(|t| serde_json::to_value(&t.events).unwrap_or_default())
        .unwrap_or_default();
    let digest = page.trace().map(|t| t.digest()).unwrap_or_default();
    let failures = check_expectations(&page, scenario.expect.as_ref());

    Ok(Report {
        name: scenario.name.clone(),
        resumes: page.resume_log().to_vec(),
        trace,
        digest,
        failures,
    })
}

fn apply_step(page: &mut SimPage, step: Step) {
    match step {
        Step::PressKey { press } => page.press_key(press),
        Step::CallPause { video } => page.call_pause(video),
        Step::UaPause { video } => page.ua_pause(video),
        Step::MediaEvent { video, kind } => page.ua_event(video, kind),
        Step::EndVideo { video } => page.end_video(video),
        Step::BufferReady { video } => page.buffer_ready(video),
        Step::AppendVideo { spec } => {
            page.append_video(spec);
        }
        Step::RemoveVideo { video } => page.remove_video(video),
        Step::NavigateStart { url } => page.navigate_start(&url),
        Step::NavigateFinish => page.navigate_finish(),
        Step::HistoryPush { url } => page.history_push(&url),
        Step::PlaylistClick => page.playlist_click(),
        Step::SetVisible { visible } => page.set_visible(visible),
        Step::HostListener { video, kind, reaction } => {
            page.add_media_listener(video, kind, Default::default(), reaction);
        }
        Step::KeydownReaction { reaction } => {
            page.add_keydown_reaction(reaction);
        }
    }
}

fn check_expectations(page: &SimPage, expect: Option<&Expectations>) -> Vec<String> {
    let mut failures = Vec::new();
    let Some(expect) = expect else { return failures };
    for (&video, &min) in &expect.min_resumes {
        let got = page.resumes_for(VideoId(video)) as u64;
        if got < min {
            failures.push(format!(
                "video#{video}: expected at least {min} resume(s), saw {got}"
            ));
        }
    }
    for (&video, &paused) in &expect.finally_paused {
        let got = page.is_paused(VideoId(video));
        if got != paused {
            failures.push(format!(
                "video#{video}: expected finally paused={paused}, saw {got}"
            ));
        }
    }
    failures
}

/// The built-in demo: miniplayer key while playing, host pauses 50 ms later,
/// guard undoes it
pub fn demo_scenario() -> Scenario {
    Scenario {
        name: "miniplayer-anti-pause".into(),
        fixture: Fixture::Videos(vec![
            VideoSpec::playing_main(),
            VideoSpec::paused_thumbnail(),
        ]),
        policy: None,
        steps: vec![
            TimedStep {
                at_ms: 100,
                step: Step::KeydownReaction {
                    reaction: HostReaction::ScheduleAfter {
                        ms: 50,
                        then: Box::new(HostReaction::PauseVideo { video: VideoId(1) }),
                    },
                },
            },
            TimedStep {
                at_ms: 100,
                step: Step::PressKey { press: KeyPress::bare("i") },
            },
        ],
        settle_ms: 1000,
        expect: Some(Expectations {
            min_resumes: BTreeMap::from([(1, 1)]),
            finally_paused: BTreeMap::from([(1, false), (2, true)]),
        }),
    }
}
