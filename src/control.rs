//! The control panel: drives a tab's capture agent and exports the guide.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::export::helpers::export_file_name;
use crate::export::{self, ExportError, ExportFormat, ExportedFile, GuideDocument};
use crate::messages::{Command, RecorderEvent, Response};
use crate::recorder::storage::{GuideSettings, StepStore, StorageError};
use crate::recorder::types::{RecordingMode, Step};
use crate::recorder::video::VideoArtifact;
use crate::relay::{RelayError, TabConnector};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Unable to reach the page. Please refresh the page and try again.")]
    RefreshRequired,
    #[error("No steps to export. Start recording first.")]
    NoSteps,
    #[error("No video recorded. Record in video mode first.")]
    NoVideo,
    /// The agent answered with an error.
    #[error("{0}")]
    Rejected(String),
    #[error("unexpected response from the page: {0:?}")]
    UnexpectedResponse(Box<Response>),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct ControlPanel<T> {
    tab: T,
    store: Arc<dyn StepStore>,
    settings: GuideSettings,
    steps: Vec<Step>,
    recording: bool,
    mode: RecordingMode,
    audio_enabled: bool,
    realtime_preview: bool,
    video: Option<VideoArtifact>,
    notices: Vec<String>,
}

impl<T: TabConnector> ControlPanel<T> {
    /// Opens the panel with the persisted settings and step list.
    pub fn new(tab: T, store: Arc<dyn StepStore>, config: &RecorderConfig) -> Result<Self, ControlError> {
        let settings = store.load_settings()?;
        let mut steps = store.load_steps()?;
        steps.sort_by_key(|s| s.id);
        Ok(Self {
            tab,
            store,
            settings,
            steps,
            recording: false,
            mode: config.mode,
            audio_enabled: config.audio_enabled,
            realtime_preview: config.realtime_preview,
            video: None,
            notices: Vec::new(),
        })
    }

    pub fn tab(&self) -> &T {
        &self.tab
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn settings(&self) -> &GuideSettings {
        &self.settings
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn mode(&self) -> RecordingMode {
        self.mode
    }

    pub fn video(&self) -> Option<&VideoArtifact> {
        self.video.as_ref()
    }

    /// Operator-facing messages collected from recorder events.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Sends a command, re-injecting the agent once if the page does not answer.
    async fn send(&self, command: Command) -> Result<Response, ControlError> {
        let response = match self.tab.send(command.clone()).await {
            Ok(response) => response,
            // a command that reached the agent but went unanswered may have
            // been applied, so only an absent receiver is retried
            Err(RelayError::NoReceiver) => {
                info!("page did not answer, injecting capture agent");
                if let Err(e) = self.tab.inject().await {
                    warn!(error = %e, "injection failed");
                    return Err(ControlError::RefreshRequired);
                }
                self.tab.send(command).await.map_err(|e| {
                    warn!(error = %e, "page still unreachable after injection");
                    ControlError::RefreshRequired
                })?
            }
            Err(e) => {
                warn!(error = %e, "cannot reach the page");
                return Err(ControlError::RefreshRequired);
            }
        };
        match response {
            Response::Error { message } => Err(ControlError::Rejected(message)),
            other => Ok(other),
        }
    }

    async fn send_ack(&self, command: Command) -> Result<(), ControlError> {
        match self.send(command).await? {
            Response::Ack => Ok(()),
            other => Err(ControlError::UnexpectedResponse(Box::new(other))),
        }
    }

    pub async fn start_recording(&mut self) -> Result<(), ControlError> {
        self.send_ack(Command::StartRecording {
            mode: self.mode,
            audio_enabled: self.audio_enabled,
        })
        .await?;
        self.recording = true;
        self.steps.clear();
        self.video = None;
        Ok(())
    }

    pub async fn stop_recording(&mut self) -> Result<u32, ControlError> {
        match self.send(Command::StopRecording).await? {
            Response::Stopped { total_steps } => {
                self.recording = false;
                self.refresh_steps().await?;
                Ok(total_steps)
            }
            other => Err(ControlError::UnexpectedResponse(Box::new(other))),
        }
    }

    /// Replaces the local view with the agent's step list.
    pub async fn refresh_steps(&mut self) -> Result<&[Step], ControlError> {
        match self.send(Command::GetSteps).await? {
            Response::Steps { steps } => {
                self.steps = steps;
                Ok(&self.steps)
            }
            other => Err(ControlError::UnexpectedResponse(Box::new(other))),
        }
    }

    pub async fn clear_steps(&mut self) -> Result<(), ControlError> {
        self.send_ack(Command::ClearSteps).await?;
        self.steps.clear();
        Ok(())
    }

    pub async fn add_manual_step(&mut self) -> Result<(), ControlError> {
        self.send_ack(Command::AddManualStep).await?;
        self.refresh_steps().await.map(|_| ())
    }

    /// Inserts a manual step after the first `after` steps.
    pub async fn insert_step_at(&mut self, after: usize) -> Result<(), ControlError> {
        self.send_ack(Command::InsertStepAt { after }).await?;
        self.refresh_steps().await.map(|_| ())
    }

    pub async fn delete_step(&mut self, index: usize) -> Result<(), ControlError> {
        self.send_ack(Command::DeleteStep { index }).await?;
        self.refresh_steps().await.map(|_| ())
    }

    pub async fn set_recording_mode(&mut self, mode: RecordingMode, audio_enabled: bool) -> Result<(), ControlError> {
        self.send_ack(Command::SetRecordingMode {
            mode,
            audio_enabled,
        })
        .await?;
        self.mode = mode;
        self.audio_enabled = audio_enabled;
        Ok(())
    }

    pub async fn set_realtime_preview(&mut self, enabled: bool) -> Result<(), ControlError> {
        self.send_ack(Command::ToggleRealtimePreview { enabled }).await?;
        self.realtime_preview = enabled;
        Ok(())
    }

    pub fn update_settings(&mut self, title: &str, description: &str) -> Result<(), ControlError> {
        self.settings = GuideSettings {
            title: title.to_string(),
            description: description.to_string(),
        };
        self.store.save_settings(&self.settings)?;
        Ok(())
    }

    /// Applies a recorder notification to the local view.
    pub fn handle_event(&mut self, event: &RecorderEvent) {
        match event {
            RecorderEvent::RecordingStarted { mode } => {
                self.recording = true;
                self.mode = *mode;
                self.steps.clear();
                self.video = None;
            }
            RecorderEvent::RecordingStopped { total_steps } => {
                debug!(total_steps, "recording stopped");
                self.recording = false;
            }
            RecorderEvent::StepPreview { step } => {
                if self.realtime_preview {
                    self.upsert(step.clone());
                }
            }
            RecorderEvent::StepCompleted { step } => self.upsert(step.clone()),
            RecorderEvent::StepsUpdated { steps } => {
                self.steps = steps.clone();
                self.steps.sort_by_key(|s| s.id);
            }
            RecorderEvent::VideoRecorded {
                media,
                mime_type,
                size,
            } => {
                self.video = Some(VideoArtifact {
                    bytes: media.clone(),
                    mime_type: mime_type.clone(),
                    size: *size,
                });
            }
            RecorderEvent::VideoUnavailable { reason } => {
                self.mode = RecordingMode::Screenshot;
                self.notices.push(format!(
                    "Screen recording unavailable ({reason}). Recording with screenshots instead."
                ));
            }
            RecorderEvent::CaptureWarning { step_id, reason } => {
                self.notices
                    .push(format!("Step {step_id} was recorded without a screenshot: {reason}"));
            }
        }
    }

    /// A completed step replaces its preview.
    fn upsert(&mut self, step: Step) {
        match self.steps.binary_search_by_key(&step.id, |s| s.id) {
            Ok(i) => self.steps[i] = step,
            Err(i) => self.steps.insert(i, step),
        }
    }

    fn document(&self) -> Result<GuideDocument, ControlError> {
        if self.steps.is_empty() {
            return Err(ControlError::NoSteps);
        }
        Ok(GuideDocument::new(&self.settings, &self.steps))
    }

    /// HTML preview of the guide.
    pub fn preview(&self) -> Result<String, ControlError> {
        Ok(export::html::generate(&self.document()?))
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportedFile, ControlError> {
        let file = export::render(&self.document()?, format)?;
        info!(file = %file.file_name, "guide exported");
        Ok(file)
    }

    pub fn export_video(&self) -> Result<ExportedFile, ControlError> {
        if self.steps.is_empty() {
            return Err(ControlError::NoSteps);
        }
        let video = self.video.as_ref().ok_or(ControlError::NoVideo)?;
        Ok(ExportedFile {
            file_name: export_file_name(&self.settings.title, "webm"),
            mime: video.mime_type.clone(),
            bytes: video.bytes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers only after `answers_after` injections.
    struct FakeTab {
        answers_after: usize,
        /// Accepts commands but never replies.
        silent: bool,
        injections: AtomicUsize,
        sent: Mutex<Vec<Command>>,
    }

    impl FakeTab {
        fn new(answers_after: usize) -> Self {
            Self {
                answers_after,
                silent: false,
                injections: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TabConnector for FakeTab {
        async fn send(&self, command: Command) -> Result<Response, RelayError> {
            if self.injections.load(Ordering::SeqCst) < self.answers_after {
                return Err(RelayError::NoReceiver);
            }
            self.sent.lock().unwrap().push(command.clone());
            if self.silent {
                return Err(RelayError::NoResponse);
            }
            Ok(match command {
                Command::StopRecording => Response::Stopped { total_steps: 1 },
                Command::GetSteps => Response::Steps {
                    steps: vec![Step::sample()],
                },
                Command::DeleteStep { .. } => Response::Error {
                    message: "step position 9 is out of range for 1 steps".into(),
                },
                _ => Response::Ack,
            })
        }

        async fn inject(&self) -> Result<(), RelayError> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn panel(answers_after: usize) -> ControlPanel<FakeTab> {
        ControlPanel::new(
            FakeTab::new(answers_after),
            Arc::new(MemoryStore::new()),
            &RecorderConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reachable_page_needs_no_injection() {
        let mut panel = panel(0);
        panel.start_recording().await.unwrap();
        assert!(panel.is_recording());
        assert_eq!(panel.tab().injections.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn injects_once_then_retries() {
        let mut panel = panel(1);
        panel.start_recording().await.unwrap();
        assert_eq!(panel.tab().injections.load(Ordering::SeqCst), 1);
        assert_eq!(panel.tab().sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_failure_asks_for_refresh() {
        let mut panel = panel(2);
        let err = panel.start_recording().await.unwrap_err();
        assert!(matches!(err, ControlError::RefreshRequired));
        assert_eq!(
            err.to_string(),
            "Unable to reach the page. Please refresh the page and try again."
        );
        assert_eq!(panel.tab().injections.load(Ordering::SeqCst), 1);
        assert!(!panel.is_recording());
    }

    #[tokio::test]
    async fn unanswered_command_is_not_resent() {
        let mut tab = FakeTab::new(0);
        tab.silent = true;
        let mut panel =
            ControlPanel::new(tab, Arc::new(MemoryStore::new()), &RecorderConfig::default()).unwrap();
        let err = panel.add_manual_step().await.unwrap_err();
        assert!(matches!(err, ControlError::RefreshRequired));
        assert_eq!(panel.tab().injections.load(Ordering::SeqCst), 0);
        assert_eq!(*panel.tab().sent.lock().unwrap(), vec![Command::AddManualStep]);
    }

    #[tokio::test]
    async fn stop_reports_total_and_refreshes() {
        let mut panel = panel(0);
        panel.start_recording().await.unwrap();
        assert_eq!(panel.stop_recording().await.unwrap(), 1);
        assert!(!panel.is_recording());
        assert_eq!(panel.steps().len(), 1);
    }

    #[tokio::test]
    async fn agent_errors_are_surfaced() {
        let mut panel = panel(0);
        let err = panel.delete_step(9).await.unwrap_err();
        assert!(matches!(err, ControlError::Rejected(m) if m.contains("out of range")));
    }

    #[test]
    fn empty_guide_cannot_be_previewed_or_exported() {
        let panel = panel(0);
        assert!(matches!(panel.preview(), Err(ControlError::NoSteps)));
        assert!(matches!(panel.export(ExportFormat::Html), Err(ControlError::NoSteps)));
        assert_eq!(
            ControlError::NoSteps.to_string(),
            "No steps to export. Start recording first."
        );
        assert!(panel.steps().is_empty());
    }

    #[test]
    fn completed_step_replaces_preview() {
        let mut panel = panel(0);
        let mut preview = Step::sample();
        preview.description = "pending".into();
        panel.handle_event(&RecorderEvent::StepPreview { step: preview });
        panel.handle_event(&RecorderEvent::StepCompleted {
            step: Step::sample(),
        });
        assert_eq!(panel.steps().len(), 1);
        assert_eq!(panel.steps()[0].description, Step::sample().description);
    }

    #[test]
    fn warnings_become_notices() {
        let mut panel = panel(0);
        panel.handle_event(&RecorderEvent::VideoUnavailable {
            reason: "screen capture permission denied".into(),
        });
        panel.handle_event(&RecorderEvent::CaptureWarning {
            step_id: 3,
            reason: "no visible tab".into(),
        });
        assert_eq!(panel.mode(), RecordingMode::Screenshot);
        let notices = panel.take_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices[1].starts_with("Step 3"));
        assert!(panel.take_notices().is_empty());
    }

    #[test]
    fn exports_video_after_recording() {
        let mut panel = panel(0);
        panel.update_settings("Demo Flow", "").unwrap();
        assert!(matches!(panel.export_video(), Err(ControlError::NoSteps)));
        panel.handle_event(&RecorderEvent::StepCompleted {
            step: Step::sample(),
        });
        assert!(matches!(panel.export_video(), Err(ControlError::NoVideo)));
        panel.handle_event(&RecorderEvent::VideoRecorded {
            media: vec![1, 2, 3],
            mime_type: "video/webm".into(),
            size: 3,
        });
        let file = panel.export_video().unwrap();
        assert_eq!(file.file_name, "demo_flow.webm");
        assert_eq!(file.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn settings_are_persisted() {
        let store = Arc::new(MemoryStore::new());
        let mut panel =
            ControlPanel::new(FakeTab::new(0), store.clone(), &RecorderConfig::default()).unwrap();
        panel.update_settings("Checkout", "Buying a plan").unwrap();
        assert_eq!(store.load_settings().unwrap().title, "Checkout");
    }
}
