use serde::{Deserialize, Serialize};

use super::element::ElementInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Input,
    Change,
    Scroll,
    Keypress,
    Submit,
    Manual,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Input => "input",
            Self::Change => "change",
            Self::Scroll => "scroll",
            Self::Keypress => "keypress",
            Self::Submit => "submit",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    #[default]
    Screenshot,
    Video,
}

/// One recorded unit of user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: u32,
    pub action: ActionKind,
    pub description: String,
    /// `data:` URL of the viewport screenshot.
    #[serde(default)]
    pub screenshot: Option<String>,
    pub url: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub element: Option<ElementInfo>,
    #[serde(default)]
    pub is_manual: bool,
}

impl Step {
    /// Step without its screenshot, as sent in live preview notifications.
    pub fn preview(&self) -> Self {
        Self {
            screenshot: None,
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub fn sample() -> Self {
        Self {
            id: 1,
            action: ActionKind::Click,
            description: "Click \"Save\" button".to_string(),
            screenshot: None,
            url: "https://example.com/settings".to_string(),
            timestamp: 1_700_000_000_000,
            element: None,
            is_manual: false,
        }
    }
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
