//! The capture agent: one task per recorded page.
//!
//! The agent owns the recording session and the step list. Page events,
//! control-panel commands, debounce timers and finished screenshots all
//! arrive on channels and are handled one at a time, so session state is
//! never shared across tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::RecorderConfig;
use crate::error::Result;
use crate::messages::{Command, RecorderEvent, Response};
use crate::recorder::capture::CaptureBackend;
use crate::recorder::element::FieldKey;
use crate::recorder::event::PageEvent;
use crate::recorder::listener::{self, CaptureRequest, Decision};
use crate::recorder::manual::{self, OperatorPrompt, OutOfRange};
use crate::recorder::page::{Highlight, PageContext};
use crate::recorder::pipeline::{self, CompletedCapture, PendingCapture};
use crate::recorder::session::RecordingSession;
use crate::recorder::state::RecorderState;
use crate::recorder::storage::StepStore;
use crate::recorder::types::{now_ms, RecordingMode, Step};
use crate::recorder::video::{ScreenSource, VideoArtifact, VideoController, VideoError};
use crate::relay::RelayError;

const COMMAND_QUEUE: usize = 32;
const PAGE_EVENT_QUEUE: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Everything the agent needs from the page and the browser.
pub struct AgentDeps {
    pub page: Arc<dyn PageContext>,
    pub capture: Arc<dyn CaptureBackend>,
    /// `None` when the browser cannot record the screen.
    pub screen: Option<Arc<dyn ScreenSource>>,
    pub prompt: Arc<dyn OperatorPrompt>,
    pub store: Arc<dyn StepStore>,
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Response>,
}

enum Internal {
    InputQuiet { session: Uuid, key: FieldKey, seq: u64 },
    ScrollQuiet { session: Uuid, seq: u64 },
    CaptureDone(CompletedCapture),
}

/// Cheap, cloneable handle to a running agent. The agent stops once every
/// handle is dropped.
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<Envelope>,
    page_events: mpsc::Sender<PageEvent>,
    events: broadcast::Sender<RecorderEvent>,
}

impl AgentHandle {
    pub async fn request(&self, command: Command) -> Result<Response, RelayError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| RelayError::NoReceiver)?;
        response.await.map_err(|_| RelayError::NoResponse)
    }

    /// Delivers a DOM event observed on the page.
    pub async fn dispatch(&self, event: PageEvent) -> Result<(), RelayError> {
        self.page_events
            .send(event)
            .await
            .map_err(|_| RelayError::NoReceiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// Pushes an event to this tab's listeners.
    pub fn publish(&self, event: RecorderEvent) -> Result<(), RelayError> {
        self.events
            .send(event)
            .map(|_| ())
            .map_err(|_| RelayError::NoReceiver)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Starts an agent on the current tokio runtime. Steps already in the
/// store are loaded so a reinjected agent continues the same guide.
pub fn spawn(deps: AgentDeps, config: RecorderConfig) -> AgentHandle {
    let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (page_events, page_rx) = mpsc::channel(PAGE_EVENT_QUEUE);
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    let (internal, internal_rx) = mpsc::unbounded_channel();

    let steps = deps.store.load_steps().unwrap_or_else(|e| {
        warn!(error = %e, "could not load stored steps, starting empty");
        Vec::new()
    });

    let agent = CaptureAgent {
        deps,
        config,
        state: RecorderState::new(),
        session: None,
        steps,
        video: VideoController::new(),
        events: events.clone(),
        internal,
    };
    tokio::spawn(agent.run(command_rx, page_rx, internal_rx));

    AgentHandle {
        commands,
        page_events,
        events,
    }
}

struct CaptureAgent {
    deps: AgentDeps,
    config: RecorderConfig,
    state: RecorderState,
    session: Option<RecordingSession>,
    steps: Vec<Step>,
    video: VideoController,
    events: broadcast::Sender<RecorderEvent>,
    internal: mpsc::UnboundedSender<Internal>,
}

fn spawn_timer(
    internal: &mpsc::UnboundedSender<Internal>,
    delay: Duration,
    message: Internal,
) -> JoinHandle<()> {
    let internal = internal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = internal.send(message);
    })
}

impl CaptureAgent {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Envelope>,
        mut page_events: mpsc::Receiver<PageEvent>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        debug!(steps = self.steps.len(), "capture agent ready");
        loop {
            tokio::select! {
                biased;
                Some(event) = page_events.recv() => self.handle_page_event(event),
                Some(message) = internal.recv() => self.handle_internal(message),
                envelope = commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        break;
                    };
                    let response = self.handle_command(command).await;
                    // the caller may have given up waiting
                    let _ = reply.send(response);
                }
                chunk = self.video.next_chunk(), if self.video.is_capturing() => {
                    self.handle_video_chunk(chunk);
                }
            }
        }
        self.shutdown();
    }

    fn emit(&self, event: RecorderEvent) {
        // no listeners is not an error
        let _ = self.events.send(event);
    }

    fn persist(&self) -> Result<()> {
        self.deps.store.save_steps(&self.steps)?;
        Ok(())
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to persist steps");
        }
    }

    async fn handle_command(&mut self, command: Command) -> Response {
        trace!(?command, "command received");
        let result = match command {
            Command::StartRecording {
                mode,
                audio_enabled,
            } => self
                .start_recording(mode, audio_enabled)
                .await
                .map(|()| Response::Ack),
            Command::StopRecording => self
                .stop_recording()
                .map(|total_steps| Response::Stopped { total_steps }),
            Command::GetSteps => Ok(Response::Steps {
                steps: self.steps.clone(),
            }),
            Command::ClearSteps => self.clear_steps().map(|()| Response::Ack),
            Command::AddManualStep => self.add_manual_step(None).map(|()| Response::Ack),
            Command::InsertStepAt { after } => {
                self.add_manual_step(Some(after)).map(|()| Response::Ack)
            }
            Command::DeleteStep { index } => self.delete_step(index).map(|()| Response::Ack),
            Command::SetRecordingMode {
                mode,
                audio_enabled,
            } => {
                self.config.mode = mode;
                self.config.audio_enabled = audio_enabled;
                Ok(Response::Ack)
            }
            Command::ToggleRealtimePreview { enabled } => {
                self.config.realtime_preview = enabled;
                Ok(Response::Ack)
            }
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "command failed");
            Response::Error {
                message: e.to_string(),
            }
        })
    }

    async fn start_recording(&mut self, mode: RecordingMode, audio: bool) -> Result<()> {
        self.state.start()?;
        self.config.mode = mode;
        self.config.audio_enabled = audio;

        let mut session = RecordingSession::new(mode);
        self.steps.clear();
        self.persist_logged();

        if mode == RecordingMode::Video {
            let started = match &self.deps.screen {
                Some(screen) => self.video.start(screen.as_ref(), audio).await,
                None => Err(VideoError::Unsupported),
            };
            if let Err(e) = started {
                warn!(error = %e, "screen recording unavailable, falling back to screenshots");
                session.mode = RecordingMode::Screenshot;
                self.emit(RecorderEvent::VideoUnavailable {
                    reason: e.to_string(),
                });
            }
        }

        info!(session = %session.id(), mode = ?session.mode, "recording started");
        self.emit(RecorderEvent::RecordingStarted { mode: session.mode });
        self.session = Some(session);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<u32> {
        self.state.stop()?;
        if let Some(mut session) = self.session.take() {
            let late = session.captures_in_flight();
            if late > 0 {
                debug!(late, "dropping captures still in flight");
            }
            for highlight in session.teardown() {
                self.deps.page.remove_highlight(highlight);
            }
        }
        manual::renumber(&mut self.steps);
        self.persist_logged();

        if let Some(artifact) = self.video.stop() {
            self.emit_video(artifact);
        }

        let total_steps = self.steps.len() as u32;
        info!(total_steps, "recording stopped");
        self.emit(RecorderEvent::RecordingStopped { total_steps });
        Ok(total_steps)
    }

    fn clear_steps(&mut self) -> Result<()> {
        self.steps.clear();
        if let Some(session) = self.session.as_mut() {
            let dropped = session.captures_in_flight();
            if dropped > 0 {
                debug!(dropped, "clearing steps, captures in flight dropped");
            }
            for highlight in session.cancel_captures() {
                self.deps.page.remove_highlight(highlight);
            }
            session.reset_counter();
        }
        self.persist()?;
        self.emit(RecorderEvent::StepsUpdated { steps: Vec::new() });
        Ok(())
    }

    fn add_manual_step(&mut self, after: Option<usize>) -> Result<()> {
        let len = self.steps.len();
        if let Some(index) = after.filter(|&a| a > len) {
            return Err(OutOfRange { index, len }.into());
        }
        let url = self.deps.page.url();
        let Some(step) = manual::prompt_manual_step(self.deps.prompt.as_ref(), &url) else {
            debug!("manual step cancelled");
            return Ok(());
        };
        let id = match (after, self.session.as_mut()) {
            // ids already handed to running captures stay ahead of the new step
            (None, Some(session)) if session.captures_in_flight() > 0 => {
                let mut step = step;
                step.id = session.next_step_id();
                let index = pipeline::place_step(&mut self.steps, step);
                self.steps[index].id
            }
            (Some(after), _) => manual::insert_after(&mut self.steps, after, step)?,
            (None, _) => manual::append(&mut self.steps, step),
        };
        if let Some(session) = self.session.as_mut() {
            session.sync_counter(self.steps.len());
        }
        debug!(step = id, "manual step added");
        self.persist()?;
        self.emit(RecorderEvent::StepsUpdated {
            steps: self.steps.clone(),
        });
        Ok(())
    }

    fn delete_step(&mut self, index: usize) -> Result<()> {
        let removed = manual::delete_at(&mut self.steps, index)?;
        debug!(step = removed.id, "step deleted");
        self.persist()?;
        self.emit(RecorderEvent::StepsUpdated {
            steps: self.steps.clone(),
        });
        Ok(())
    }

    fn handle_page_event(&mut self, event: PageEvent) {
        let Some(session) = self.session.as_mut() else {
            trace!("not recording, page event ignored");
            return;
        };
        match listener::classify(&event, &mut session.fields) {
            Decision::Capture(request) => self.begin_capture(request),
            Decision::DebounceInput { key, element } => {
                let seq = session.next_timer_seq();
                let message = Internal::InputQuiet {
                    session: session.id(),
                    key: key.clone(),
                    seq,
                };
                let timer = spawn_timer(&self.internal, self.config.input_debounce(), message);
                session.schedule_input(key, element, seq, timer);
            }
            Decision::DebounceScroll => {
                let seq = session.next_timer_seq();
                let message = Internal::ScrollQuiet {
                    session: session.id(),
                    seq,
                };
                let timer = spawn_timer(&self.internal, self.config.scroll_debounce(), message);
                session.schedule_scroll(seq, timer);
            }
            Decision::Ignore(reason) => trace!(?reason, "page event ignored"),
        }
    }

    /// Assigns the step id, shows the preview and highlight, then hands the
    /// screenshot off to a task so later events are not held up.
    fn begin_capture(&mut self, request: CaptureRequest) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let session_id = session.id();
        let id = session.next_step_id();
        let mode = session.mode;

        let pending = PendingCapture::new(session_id, id, request, self.deps.page.url(), now_ms());
        if self.config.realtime_preview {
            self.emit(RecorderEvent::StepPreview {
                step: pending.preview(),
            });
        }
        let highlight = pending
            .element
            .as_ref()
            .map(|element| self.deps.page.show_highlight(&Highlight::around(element.rect)));

        let backend: Option<Arc<dyn CaptureBackend>> =
            (mode == RecordingMode::Screenshot).then(|| self.deps.capture.clone());
        let delay = self.config.capture_delay();
        let internal = self.internal.clone();
        debug!(step = id, action = %pending.action, "capture started");
        let task = tokio::spawn(async move {
            let done = pipeline::acquire(pending, backend, delay).await;
            let _ = internal.send(Internal::CaptureDone(done));
        });

        if let Some(session) = self.session.as_mut() {
            session.track_capture(id, highlight, task);
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::InputQuiet { session, key, seq } => {
                let Some(current) = self.session.as_mut().filter(|s| s.id() == session) else {
                    return;
                };
                let Some(element) = current.take_settled_input(&key, seq) else {
                    trace!(field = %key.0, "stale input timer");
                    return;
                };
                if let Some(request) = current.fields.input_settled(&element) {
                    self.begin_capture(request);
                }
            }
            Internal::ScrollQuiet { session, seq } => {
                let Some(current) = self.session.as_mut().filter(|s| s.id() == session) else {
                    return;
                };
                if !current.scroll_settled(seq) {
                    return;
                }
                let metrics = self.deps.page.scroll_metrics();
                self.begin_capture(CaptureRequest::scroll(&metrics));
            }
            Internal::CaptureDone(done) => self.finish_capture(done),
        }
    }

    fn finish_capture(&mut self, done: CompletedCapture) {
        let id = done.pending.id;
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.id() == done.pending.session)
        else {
            debug!(step = id, "capture finished after its session ended, dropped");
            return;
        };
        let Some(highlight) = session.finish_capture(id) else {
            debug!(step = id, "capture no longer tracked, dropped");
            return;
        };
        let settled = session.captures_in_flight() == 0;

        if let Some(highlight) = highlight {
            self.deps.page.remove_highlight(highlight);
        }
        if let Err(e) = &done.screenshot {
            warn!(step = id, error = %e, "screenshot failed, keeping step without it");
            self.emit(RecorderEvent::CaptureWarning {
                step_id: id,
                reason: e.to_string(),
            });
        }

        let index = pipeline::place_step(&mut self.steps, pipeline::assemble(done));
        if settled {
            manual::renumber(&mut self.steps);
        }
        self.persist_logged();

        let step = self.steps[index].clone();
        info!(step = step.id, action = %step.action, "step captured");
        self.emit(RecorderEvent::StepCompleted { step });
    }

    fn handle_video_chunk(&mut self, chunk: Option<Vec<u8>>) {
        match chunk {
            Some(chunk) => self.video.push_chunk(chunk),
            None => {
                info!("screen recording ended from the browser");
                if let Some(artifact) = self.video.stop() {
                    self.emit_video(artifact);
                }
                if let Some(session) = self.session.as_mut() {
                    session.mode = RecordingMode::Screenshot;
                }
            }
        }
    }

    fn emit_video(&self, artifact: VideoArtifact) {
        self.emit(RecorderEvent::VideoRecorded {
            media: artifact.bytes,
            mime_type: artifact.mime_type,
            size: artifact.size,
        });
    }

    fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            for highlight in session.teardown() {
                self.deps.page.remove_highlight(highlight);
            }
        }
        // nobody is left to receive the recording
        let _ = self.video.stop();
        debug!("capture agent stopped");
    }
}
