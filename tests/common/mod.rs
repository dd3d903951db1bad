#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::{broadcast, mpsc};

use guidecast::config::RecorderConfig;
use guidecast::messages::RecorderEvent;
use guidecast::recorder::capture::{CaptureBackend, CaptureError};
use guidecast::recorder::describe::ScrollMetrics;
use guidecast::recorder::element::{ElementSnapshot, Rect};
use guidecast::recorder::manual::OperatorPrompt;
use guidecast::recorder::page::{Highlight, HighlightId, PageContext};
use guidecast::recorder::storage::{MemoryStore, StepStore};
use guidecast::recorder::video::{MediaStream, ScreenSource, StreamTracks, VideoError};
use guidecast::{AgentDeps, AgentHandle};

pub const PAGE_URL: &str = "https://app.example.com/settings";

pub fn png_data_url() -> String {
    let img = image::RgbaImage::from_pixel(8, 6, image::Rgba([10, 200, 90, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
    )
}

pub struct FakePage {
    pub url: Mutex<String>,
    pub scroll: Mutex<ScrollMetrics>,
    next_highlight: AtomicU64,
    pub active: Mutex<HashSet<HighlightId>>,
    pub shown: AtomicUsize,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            url: Mutex::new(PAGE_URL.to_string()),
            scroll: Mutex::new(ScrollMetrics::default()),
            next_highlight: AtomicU64::new(1),
            active: Mutex::new(HashSet::new()),
            shown: AtomicUsize::new(0),
        }
    }

    pub fn active_highlights(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

impl PageContext for FakePage {
    fn url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        *self.scroll.lock().unwrap()
    }

    fn show_highlight(&self, _highlight: &Highlight) -> HighlightId {
        let id = HighlightId(self.next_highlight.fetch_add(1, Ordering::SeqCst));
        self.active.lock().unwrap().insert(id);
        self.shown.fetch_add(1, Ordering::SeqCst);
        id
    }

    fn remove_highlight(&self, id: HighlightId) {
        self.active.lock().unwrap().remove(&id);
    }
}

pub struct FakeCapture {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for FakeCapture {
    async fn capture_visible_tab(&self) -> Result<String, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        Ok(png_data_url())
    }
}

/// Answers prompts from a script; an exhausted script cancels.
pub struct ScriptedPrompt(pub Mutex<VecDeque<Option<String>>>);

impl ScriptedPrompt {
    pub fn new(answers: &[Option<&str>]) -> Self {
        Self(Mutex::new(
            answers.iter().map(|a| a.map(str::to_string)).collect(),
        ))
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn ask(&self, _message: &str) -> Option<String> {
        self.0.lock().unwrap().pop_front().flatten()
    }
}

pub struct FakeTracks(pub Arc<AtomicBool>);

impl StreamTracks for FakeTracks {
    fn stop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct FakeScreen {
    pub sender: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    pub stopped: Arc<AtomicBool>,
    pub deny: bool,
}

impl FakeScreen {
    pub fn new(deny: bool) -> Self {
        Self {
            sender: Mutex::new(None),
            stopped: Arc::new(AtomicBool::new(false)),
            deny,
        }
    }

    pub async fn send_chunk(&self, chunk: &[u8]) {
        let sender = self.sender.lock().unwrap().clone().expect("stream acquired");
        sender.send(chunk.to_vec()).await.unwrap();
    }

    /// Simulates the user ending the share from the browser UI.
    pub fn end(&self) {
        self.sender.lock().unwrap().take();
    }
}

#[async_trait]
impl ScreenSource for FakeScreen {
    async fn acquire(&self, _audio: bool) -> Result<MediaStream, VideoError> {
        if self.deny {
            return Err(VideoError::PermissionDenied);
        }
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(MediaStream {
            mime_type: "video/webm".into(),
            chunks: rx,
            tracks: Box::new(FakeTracks(self.stopped.clone())),
        })
    }
}

pub struct Harness {
    pub agent: AgentHandle,
    pub events: broadcast::Receiver<RecorderEvent>,
    pub page: Arc<FakePage>,
    pub capture: Arc<FakeCapture>,
    pub store: Arc<MemoryStore>,
    pub screen: Option<Arc<FakeScreen>>,
}

pub struct HarnessBuilder {
    pub config: RecorderConfig,
    pub prompt: Vec<Option<&'static str>>,
    pub screen: Option<Arc<FakeScreen>>,
    pub store: Arc<MemoryStore>,
    pub fail_capture: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: RecorderConfig::default(),
            prompt: Vec::new(),
            screen: None,
            store: Arc::new(MemoryStore::new()),
            fail_capture: false,
        }
    }

    pub fn spawn(self) -> Harness {
        let page = Arc::new(FakePage::new());
        let capture = Arc::new(FakeCapture::new());
        capture.fail.store(self.fail_capture, Ordering::SeqCst);
        let deps = AgentDeps {
            page: page.clone(),
            capture: capture.clone(),
            screen: self
                .screen
                .clone()
                .map(|s| s as Arc<dyn ScreenSource>),
            prompt: Arc::new(ScriptedPrompt::new(&self.prompt)),
            store: self.store.clone(),
        };
        let agent = guidecast::spawn(deps, self.config);
        let events = agent.subscribe();
        Harness {
            agent,
            events,
            page,
            capture,
            store: self.store,
            screen: self.screen,
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().spawn()
}

impl Harness {
    /// Waits for the first event matching `pred`, skipping others.
    pub async fn until(&mut self, pred: impl Fn(&RecorderEvent) -> bool) -> RecorderEvent {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                let event = self.events.recv().await.expect("event stream open");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("event arrived")
    }

    pub async fn completed(&mut self) -> guidecast::recorder::types::Step {
        match self
            .until(|e| matches!(e, RecorderEvent::StepCompleted { .. }))
            .await
        {
            RecorderEvent::StepCompleted { step } => step,
            _ => unreachable!(),
        }
    }

    pub fn stored_steps(&self) -> Vec<guidecast::recorder::types::Step> {
        self.store.load_steps().unwrap()
    }
}

fn rect() -> Rect {
    Rect {
        x: 40.0,
        y: 120.0,
        width: 96.0,
        height: 32.0,
    }
}

pub fn button(label: &str) -> ElementSnapshot {
    let mut el = ElementSnapshot::new("BUTTON");
    el.text_content = label.into();
    el.rect = rect();
    el
}

pub fn submit_button(label: &str) -> ElementSnapshot {
    let mut el = button(label);
    el.input_type = "submit".into();
    el
}

pub fn text_field(id: &str, placeholder: &str, value: &str) -> ElementSnapshot {
    let mut el = ElementSnapshot::new("INPUT");
    el.input_type = "text".into();
    el.id = id.into();
    el.placeholder = placeholder.into();
    el.value = value.into();
    el.rect = rect();
    el
}

pub fn form(name: &str) -> ElementSnapshot {
    let mut el = ElementSnapshot::new("FORM");
    el.name = name.into();
    el
}
