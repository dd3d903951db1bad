//! Operator-authored steps and list editing.
//!
//! All edits keep ids equal to 1-based positions.

use super::types::{now_ms, ActionKind, Step};

pub const PROMPT_MESSAGE: &str = "Enter step description:";

/// Free-text prompt shown to the operator. `None` means cancelled.
pub trait OperatorPrompt: Send + Sync {
    fn ask(&self, message: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("step position {index} is out of range for {len} steps")]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

pub fn renumber(steps: &mut [Step]) {
    for (i, step) in steps.iter_mut().enumerate() {
        step.id = i as u32 + 1;
    }
}

pub fn manual_step(description: &str, url: &str) -> Step {
    Step {
        id: 0,
        action: ActionKind::Manual,
        description: description.trim().to_string(),
        screenshot: None,
        url: url.to_string(),
        timestamp: now_ms(),
        element: None,
        is_manual: true,
    }
}

/// Asks the operator for a description. Cancel and blank input both yield `None`.
pub fn prompt_manual_step(prompt: &dyn OperatorPrompt, url: &str) -> Option<Step> {
    let answer = prompt.ask(PROMPT_MESSAGE)?;
    if answer.trim().is_empty() {
        return None;
    }
    Some(manual_step(&answer, url))
}

/// Inserts `step` after the first `after` steps, so it gets id `after + 1`.
pub fn insert_after(steps: &mut Vec<Step>, after: usize, step: Step) -> Result<u32, OutOfRange> {
    if after > steps.len() {
        return Err(OutOfRange {
            index: after,
            len: steps.len(),
        });
    }
    steps.insert(after, step);
    renumber(steps);
    Ok(after as u32 + 1)
}

pub fn append(steps: &mut Vec<Step>, step: Step) -> u32 {
    steps.push(step);
    renumber(steps);
    steps.len() as u32
}

/// Removes the step at 0-based `index` and closes the gap.
pub fn delete_at(steps: &mut Vec<Step>, index: usize) -> Result<Step, OutOfRange> {
    if index >= steps.len() {
        return Err(OutOfRange {
            index,
            len: steps.len(),
        });
    }
    let removed = steps.remove(index);
    renumber(steps);
    Ok(removed)
}
