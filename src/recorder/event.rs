use serde::{Deserialize, Serialize};

use super::element::ElementSnapshot;

/// Raw browser event kinds the recorder listens for (capture phase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageEventKind {
    Click,
    Input,
    Change,
    Scroll,
    Keydown {
        key: String,
        #[serde(default, rename = "shiftKey")]
        shift: bool,
    },
    Submit,
    Focus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEvent {
    #[serde(flatten)]
    pub kind: PageEventKind,
    #[serde(default)]
    pub target: Option<ElementSnapshot>,
    pub timestamp_ms: i64,
}

impl PageEvent {
    pub fn new(kind: PageEventKind, target: Option<ElementSnapshot>) -> Self {
        Self {
            kind,
            target,
            timestamp_ms: super::types::now_ms(),
        }
    }

    pub fn click(target: ElementSnapshot) -> Self {
        Self::new(PageEventKind::Click, Some(target))
    }

    pub fn input(target: ElementSnapshot) -> Self {
        Self::new(PageEventKind::Input, Some(target))
    }

    pub fn focus(target: ElementSnapshot) -> Self {
        Self::new(PageEventKind::Focus, Some(target))
    }

    pub fn change(target: ElementSnapshot) -> Self {
        Self::new(PageEventKind::Change, Some(target))
    }

    pub fn submit(form: ElementSnapshot) -> Self {
        Self::new(PageEventKind::Submit, Some(form))
    }

    pub fn scroll() -> Self {
        Self::new(PageEventKind::Scroll, None)
    }

    pub fn keydown(target: ElementSnapshot, key: &str, shift: bool) -> Self {
        Self::new(
            PageEventKind::Keydown {
                key: key.to_string(),
                shift,
            },
            Some(target),
        )
    }
}
