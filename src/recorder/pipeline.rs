//! Capture pipeline: classified event → highlight → screenshot → step.
//!
//! - The agent assigns the step id and emits the preview
//! - [`acquire`] waits for the highlight to render, then grabs the screenshot
//! - [`assemble`] builds the final [`Step`]
//! - [`place_step`] files it into the list in id order

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::capture::{CaptureBackend, CaptureError};
use super::element::{ElementInfo, ElementSnapshot};
use super::listener::CaptureRequest;
use super::types::{ActionKind, Step};

/// A step whose id is fixed but whose evidence is still being gathered.
#[derive(Debug, Clone)]
pub struct PendingCapture {
    pub session: Uuid,
    pub id: u32,
    pub action: ActionKind,
    pub description: String,
    pub element: Option<ElementSnapshot>,
    pub url: String,
    pub timestamp: i64,
}

impl PendingCapture {
    pub fn new(session: Uuid, id: u32, request: CaptureRequest, url: String, timestamp: i64) -> Self {
        Self {
            session,
            id,
            action: request.action,
            description: request.description,
            element: request.element,
            url,
            timestamp,
        }
    }

    /// The not-yet-final step shown while the capture runs.
    pub fn preview(&self) -> Step {
        Step {
            id: self.id,
            action: self.action,
            description: self.description.clone(),
            screenshot: None,
            url: self.url.clone(),
            timestamp: self.timestamp,
            element: None,
            is_manual: false,
        }
    }
}

#[derive(Debug)]
pub struct CompletedCapture {
    pub pending: PendingCapture,
    /// `Ok(None)` when no screenshot was requested (video mode).
    pub screenshot: Result<Option<String>, CaptureError>,
}

/// Waits `delay` so the highlight is on screen, then takes the screenshot.
/// Pass no backend in video mode; the screen recording covers the step.
pub async fn acquire(
    pending: PendingCapture,
    backend: Option<Arc<dyn CaptureBackend>>,
    delay: Duration,
) -> CompletedCapture {
    tokio::time::sleep(delay).await;
    let screenshot = match backend {
        Some(backend) => backend.capture_visible_tab().await.map(Some),
        None => Ok(None),
    };
    CompletedCapture {
        pending,
        screenshot,
    }
}

/// Builds the final step. A failed screenshot leaves the step without one.
pub fn assemble(completed: CompletedCapture) -> Step {
    let CompletedCapture {
        pending,
        screenshot,
    } = completed;
    let element = match pending.action {
        ActionKind::Scroll | ActionKind::Manual => None,
        _ => pending.element.as_ref().map(ElementInfo::from),
    };
    Step {
        id: pending.id,
        action: pending.action,
        description: pending.description,
        screenshot: screenshot.ok().flatten(),
        url: pending.url,
        timestamp: pending.timestamp,
        element,
        is_manual: false,
    }
}

/// Inserts the step after every step with a lower or equal id.
///
/// Captures can finish out of order; placing by id keeps the list in
/// classification order. Returns the index the step landed at.
pub fn place_step(steps: &mut Vec<Step>, step: Step) -> usize {
    let index = steps.partition_point(|s| s.id <= step.id);
    steps.insert(index, step);
    index
}
