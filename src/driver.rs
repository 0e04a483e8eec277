//! Async-friendly driver API
//!
//! A dedicated worker thread owns a [`SimPage`] (guard attached) and
//! executes commands sent from async tasks, so callers get an async
//! interface without the page needing to be `Send` across threads.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use crate::media::{KeyPress, VideoId};
use crate::sim::{ResumeRecord, SimPage, VideoSpec};
use crate::{Error, GuardPolicy, Result};

/// Callback invoked for every guard-issued resume the page observes
pub type ResumeCallback = Arc<dyn Fn(&ResumeRecord) + Send + Sync + 'static>;

enum Command {
    AppendVideo(VideoSpec, oneshot::Sender<Result<VideoId>>),
    RemoveVideo(VideoId, oneshot::Sender<Result<()>>),
    PressKey(KeyPress, oneshot::Sender<Result<()>>),
    CallPause(VideoId, oneshot::Sender<Result<()>>),
    UaPause(VideoId, oneshot::Sender<Result<()>>),
    EndVideo(VideoId, oneshot::Sender<Result<()>>),
    BufferReady(VideoId, oneshot::Sender<Result<()>>),
    SetVisible(bool, oneshot::Sender<Result<()>>),
    Advance(u64, oneshot::Sender<Result<u64>>),
    IsPaused(VideoId, oneshot::Sender<Result<bool>>),
    ResumeLog(oneshot::Sender<Result<Vec<ResumeRecord>>>),
    TraceJson(oneshot::Sender<Result<String>>),
    OnResume(ResumeCallback, oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async handle to a guarded page running on a worker thread
#[derive(Clone)]
pub struct GuardDriver {
    cmd_tx: Sender<Command>,
}

impl GuardDriver {
    /// Spawn the worker thread, build the page and attach the guard
    pub async fn new(policy: Option<GuardPolicy>) -> Result<Self> {
        let policy = policy.unwrap_or_default();

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            // Build the page on the worker thread
            let mut page = SimPage::new();
            if let Err(err) = page.attach_guard(policy) {
                let _ = init_tx.send(Err(err));
                return;
            }
            let _ = init_tx.send(Ok(()));

            let mut on_resume: Option<ResumeCallback> = None;
            let mut notified = 0usize;

            // Command loop
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::AppendVideo(spec, resp) => {
                        let id = page.append_video(spec);
                        let _ = resp.send(Ok(id));
                    }
                    Command::RemoveVideo(video, resp) => {
                        page.remove_video(video);
                        let _ = resp.send(Ok(()));
                    }
                    Command::PressKey(press, resp) => {
                        page.press_key(press);
                        let _ = resp.send(Ok(()));
                    }
                    Command::CallPause(video, resp) => {
                        page.call_pause(video);
                        let _ = resp.send(Ok(()));
                    }
                    Command::UaPause(video, resp) => {
                        page.ua_pause(video);
                        let _ = resp.send(Ok(()));
                    }
                    Command::EndVideo(video, resp) => {
                        page.end_video(video);
                        let _ = resp.send(Ok(()));
                    }
                    Command::BufferReady(video, resp) => {
                        page.buffer_ready(video);
                        let _ = resp.send(Ok(()));
                    }
                    Command::SetVisible(visible, resp) => {
                        page.set_visible(visible);
                        let _ = resp.send(Ok(()));
                    }
                    Command::Advance(ms, resp) => {
                        page.advance(ms);
                        let _ = resp.send(Ok(page.now()));
                    }
                    Command::IsPaused(video, resp) => {
                        let _ = resp.send(Ok(page.is_paused(video)));
                    }
                    Command::ResumeLog(resp) => {
                        let _ = resp.send(Ok(page.resume_log().to_vec()));
                    }
                    Command::TraceJson(resp) => {
                        let json = page.trace().map(|t| t.to_json()).unwrap_or_default();
                        let _ = resp.send(Ok(json));
                    }
                    Command::OnResume(cb, resp) => {
                        on_resume = Some(cb);
                        let _ = resp.send(Ok(()));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
                // Notify for resumes appended by the command just handled
                if let Some(cb) = on_resume.as_ref() {
                    let log = page.resume_log();
                    for record in &log[notified..] {
                        cb(record);
                    }
                    notified = log.len();
                }
            }
        });

        let init_res = init_rx
            .await
            .map_err(|e| Error::DriverError(format!("worker init canceled: {e}")))?;
        init_res?;

        Ok(Self { cmd_tx })
    }

    pub async fn append_video(&self, spec: VideoSpec) -> Result<VideoId> {
        self.send(|tx| Command::AppendVideo(spec, tx)).await
    }

    pub async fn remove_video(&self, video: VideoId) -> Result<()> {
        self.send(|tx| Command::RemoveVideo(video, tx)).await
    }

    pub async fn press_key(&self, press: KeyPress) -> Result<()> {
        self.send(|tx| Command::PressKey(press, tx)).await
    }

    /// Pause through the intercepted method, as page scripts do
    pub async fn call_pause(&self, video: VideoId) -> Result<()> {
        self.send(|tx| Command::CallPause(video, tx)).await
    }

    /// Pause bypassing the method; only the event safety net sees it
    pub async fn ua_pause(&self, video: VideoId) -> Result<()> {
        self.send(|tx| Command::UaPause(video, tx)).await
    }

    pub async fn end_video(&self, video: VideoId) -> Result<()> {
        self.send(|tx| Command::EndVideo(video, tx)).await
    }

    pub async fn buffer_ready(&self, video: VideoId) -> Result<()> {
        self.send(|tx| Command::BufferReady(video, tx)).await
    }

    pub async fn set_visible(&self, visible: bool) -> Result<()> {
        self.send(|tx| Command::SetVisible(visible, tx)).await
    }

    /// Advance the page's virtual clock; returns the new time
    pub async fn advance(&self, ms: u64) -> Result<u64> {
        self.send(|tx| Command::Advance(ms, tx)).await
    }

    pub async fn is_paused(&self, video: VideoId) -> Result<bool> {
        self.send(|tx| Command::IsPaused(video, tx)).await
    }

    pub async fn resume_log(&self) -> Result<Vec<ResumeRecord>> {
        self.send(Command::ResumeLog).await
    }

    /// The guard's decision trace as pretty JSON
    pub async fn trace_json(&self) -> Result<String> {
        self.send(Command::TraceJson).await
    }

    /// Register a callback invoked for each guard-issued resume
    pub async fn on_resume<F>(&self, cb: F) -> Result<()>
    where
        F: Fn(&ResumeRecord) + Send + Sync + 'static,
    {
        self.send(|tx| Command::OnResume(Arc::new(cb), tx)).await
    }

    /// Shut down the worker thread
    pub async fn close(self) -> Result<()> {
        self.send(Command::Close).await
    }

    async fn send<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<Result<T>>) -> Command,
    {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::DriverError("worker is gone".into()))?;
        rx.await
            .map_err(|e| Error::DriverError(format!("command canceled: {e}")))?
    }
}
