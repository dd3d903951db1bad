use std::collections::HashMap;

use tokio::task::JoinHandle;
use uuid::Uuid;

use super::element::{ElementSnapshot, FieldKey};
use super::listener::FieldStates;
use super::page::HighlightId;
use super::types::RecordingMode;

struct PendingInput {
    element: ElementSnapshot,
    seq: u64,
    timer: JoinHandle<()>,
}

struct InFlight {
    highlight: Option<HighlightId>,
    task: JoinHandle<()>,
}

/// State of one recording, from the start command to the stop command.
///
/// Dropping the session (or calling [`RecordingSession::teardown`]) aborts
/// every pending debounce timer and every capture still in flight.
pub struct RecordingSession {
    id: Uuid,
    pub mode: RecordingMode,
    counter: u32,
    pub fields: FieldStates,
    pending_inputs: HashMap<FieldKey, PendingInput>,
    scroll_timer: Option<(u64, JoinHandle<()>)>,
    in_flight: HashMap<u32, InFlight>,
    timer_seq: u64,
}

impl RecordingSession {
    pub fn new(mode: RecordingMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            counter: 0,
            fields: FieldStates::new(),
            pending_inputs: HashMap::new(),
            scroll_timer: None,
            in_flight: HashMap::new(),
            timer_seq: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step_count(&self) -> u32 {
        self.counter
    }

    pub fn next_step_id(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }

    /// Re-bases the counter after the step list was edited mid-session.
    pub fn sync_counter(&mut self, len: usize) {
        self.counter = self.counter.max(len as u32);
    }

    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    /// Sequence number for the next debounce timer. A timer only counts
    /// when its number still matches the one registered for its slot.
    pub fn next_timer_seq(&mut self) -> u64 {
        self.timer_seq += 1;
        self.timer_seq
    }

    /// Replaces the field's input timer, keeping the latest snapshot.
    pub fn schedule_input(
        &mut self,
        key: FieldKey,
        element: ElementSnapshot,
        seq: u64,
        timer: JoinHandle<()>,
    ) {
        let pending = PendingInput {
            element,
            seq,
            timer,
        };
        if let Some(previous) = self.pending_inputs.insert(key, pending) {
            previous.timer.abort();
        }
    }

    /// Takes the latest snapshot for a field whose quiet period elapsed.
    pub fn take_settled_input(&mut self, key: &FieldKey, seq: u64) -> Option<ElementSnapshot> {
        match self.pending_inputs.get(key) {
            Some(pending) if pending.seq == seq => {
                self.pending_inputs.remove(key).map(|pending| pending.element)
            }
            _ => None,
        }
    }

    pub fn schedule_scroll(&mut self, seq: u64, timer: JoinHandle<()>) {
        if let Some((_, previous)) = self.scroll_timer.replace((seq, timer)) {
            previous.abort();
        }
    }

    pub fn scroll_settled(&mut self, seq: u64) -> bool {
        match self.scroll_timer {
            Some((current, _)) if current == seq => {
                self.scroll_timer = None;
                true
            }
            _ => false,
        }
    }

    pub fn track_capture(&mut self, step_id: u32, highlight: Option<HighlightId>, task: JoinHandle<()>) {
        self.in_flight.insert(step_id, InFlight { highlight, task });
    }

    /// Forgets a finished capture and hands back its highlight for removal.
    /// `None` means the capture is unknown to this session.
    pub fn finish_capture(&mut self, step_id: u32) -> Option<Option<HighlightId>> {
        self.in_flight.remove(&step_id).map(|f| f.highlight)
    }

    /// Aborts every capture still running; returns their highlights.
    pub fn cancel_captures(&mut self) -> Vec<HighlightId> {
        self.in_flight
            .drain()
            .filter_map(|(_, flight)| {
                flight.task.abort();
                flight.highlight
            })
            .collect()
    }

    pub fn captures_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.pending_inputs.len() + usize::from(self.scroll_timer.is_some())
    }

    /// Cancels timers and captures; returns highlights still on the page.
    pub fn teardown(&mut self) -> Vec<HighlightId> {
        for (_, pending) in self.pending_inputs.drain() {
            pending.timer.abort();
        }
        if let Some((_, timer)) = self.scroll_timer.take() {
            timer.abort();
        }
        self.fields.clear();
        self.cancel_captures()
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
