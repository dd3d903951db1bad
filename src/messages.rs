//! Messages between the control panel and the capture agent.

use serde::{Deserialize, Serialize};

use crate::recorder::types::{RecordingMode, Step};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    StartRecording {
        mode: RecordingMode,
        #[serde(default)]
        audio_enabled: bool,
    },
    StopRecording,
    GetSteps,
    ClearSteps,
    /// Prompt for a manual step and append it.
    AddManualStep,
    /// Prompt for a manual step and insert it after the first `after` steps.
    InsertStepAt {
        after: usize,
    },
    DeleteStep {
        index: usize,
    },
    SetRecordingMode {
        mode: RecordingMode,
        #[serde(default)]
        audio_enabled: bool,
    },
    ToggleRealtimePreview {
        enabled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    Ack,
    Stopped { total_steps: u32 },
    Steps { steps: Vec<Step> },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RecorderEvent {
    RecordingStarted {
        mode: RecordingMode,
    },
    RecordingStopped {
        total_steps: u32,
    },
    StepPreview {
        step: Step,
    },
    StepCompleted {
        step: Step,
    },
    StepsUpdated {
        steps: Vec<Step>,
    },
    VideoRecorded {
        #[serde(with = "base64_bytes")]
        media: Vec<u8>,
        mime_type: String,
        size: usize,
    },
    VideoUnavailable {
        reason: String,
    },
    CaptureWarning {
        step_id: u32,
        reason: String,
    },
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
