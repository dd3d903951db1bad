//! Structural snapshots of page elements.
//!
//! The page side serialises the event target into an [`ElementSnapshot`]
//! before handing it to the recorder, so classification and description work
//! on plain data instead of a live DOM node.

use serde::{Deserialize, Serialize};

const INNER_TEXT_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedStyles {
    pub background_color: String,
    pub color: String,
    pub font_size: String,
    pub font_family: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag_name: String,
    pub id: String,
    /// Space separated, as in the `class` attribute.
    pub class_name: String,
    pub role: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub name: String,
    pub placeholder: String,
    pub value: String,
    pub href: String,
    pub aria_label: String,
    pub title: String,
    pub alt: String,
    pub checked: bool,
    pub has_click_handler: bool,
    pub has_child_elements: bool,
    pub text_content: String,
    /// Direct text node children, in document order.
    pub text_nodes: Vec<String>,
    /// Text of the selected `<option>`, for `select` elements.
    pub selected_option: Option<String>,
    /// Position among elements with the same tag name.
    pub tag_index: usize,
    pub rect: Rect,
    pub styles: ComputedStyles,
}

impl ElementSnapshot {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            ..Self::default()
        }
    }

    pub fn tag(&self) -> String {
        self.tag_name.to_ascii_lowercase()
    }

    pub fn kind(&self) -> String {
        self.input_type.to_ascii_lowercase()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.class_name.split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn is_password(&self) -> bool {
        self.tag() == "input" && self.kind() == "password"
    }

    /// Free-text fields whose clicks and keystrokes are deduplicated per session.
    pub fn is_text_like(&self) -> bool {
        match self.tag().as_str() {
            "textarea" => true,
            "input" => matches!(
                self.kind().as_str(),
                "" | "text" | "email" | "password" | "search" | "tel" | "url" | "number"
            ),
            _ => false,
        }
    }

    /// Stable key for per-field interaction state within one session.
    pub fn field_key(&self) -> FieldKey {
        if !self.id.is_empty() {
            return FieldKey(format!("id:{}", self.id));
        }
        if !self.name.is_empty() {
            return FieldKey(format!("name:{}", self.name));
        }
        if !self.class_name.trim().is_empty() {
            return FieldKey(format!("class:{}", self.class_name.trim()));
        }
        FieldKey(format!("tag:{}#{}", self.tag(), self.tag_index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey(pub String);

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The element details persisted with a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,
    pub class_name: String,
    pub id: String,
    pub inner_text: String,
    pub placeholder: String,
    pub value: String,
    pub href: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub name: String,
    pub aria_label: String,
    pub title: String,
    pub rect: Rect,
    pub styles: ComputedStyles,
}

impl From<&ElementSnapshot> for ElementInfo {
    fn from(el: &ElementSnapshot) -> Self {
        Self {
            tag_name: el.tag_name.to_ascii_uppercase(),
            class_name: el.class_name.clone(),
            id: el.id.clone(),
            inner_text: el.text_content.trim().chars().take(INNER_TEXT_LIMIT).collect(),
            placeholder: el.placeholder.clone(),
            // never persist what was typed into a password field
            value: if el.is_password() {
                String::new()
            } else {
                el.value.clone()
            },
            href: el.href.clone(),
            input_type: el.input_type.clone(),
            name: el.name.clone(),
            aria_label: el.aria_label.clone(),
            title: el.title.clone(),
            rect: el.rect,
            styles: el.styles.clone(),
        }
    }
}
