//! Human-readable step descriptions.
//!
//! Everything here is a pure function of an [`ElementSnapshot`] and, for
//! scrolls, the page's [`ScrollMetrics`].

use serde::{Deserialize, Serialize};

use super::element::ElementSnapshot;
use super::types::ActionKind;

const TEXT_LIMIT: usize = 100;
const TEXTAREA_VALUE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    pub scroll_y: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    /// Scroll position as a whole percentage of the scrollable range.
    ///
    /// A page that does not scroll is fully visible and reports 100.
    pub fn percent(&self) -> u32 {
        let range = self.scroll_height - self.viewport_height;
        if range <= 0.0 || !range.is_finite() {
            return 100;
        }
        let pct = (self.scroll_y / range * 100.0).round();
        if pct.is_nan() {
            return 0;
        }
        pct.clamp(0.0, 100.0) as u32
    }
}

/// What a click landed on, decided from the snapshot alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    SubmitButton,
    Button,
    Link { host: Option<String> },
    Checkbox { checked: bool },
    Radio,
    InputField,
    Dropdown,
    ClickableContainer,
    Container,
    Image { alt: Option<String> },
    ListItem,
    Other,
}

pub fn classify_click_target(el: &ElementSnapshot) -> ClickTarget {
    let kind = el.kind();
    match el.tag().as_str() {
        "button" if kind == "submit" => ClickTarget::SubmitButton,
        "button" => ClickTarget::Button,
        "a" => ClickTarget::Link {
            host: link_host(&el.href),
        },
        "input" => match kind.as_str() {
            "submit" => ClickTarget::SubmitButton,
            "button" => ClickTarget::Button,
            "checkbox" => ClickTarget::Checkbox {
                checked: el.checked,
            },
            "radio" => ClickTarget::Radio,
            _ => ClickTarget::InputField,
        },
        "textarea" => ClickTarget::InputField,
        "select" => ClickTarget::Dropdown,
        "div" | "span" if is_clickable_container(el) => ClickTarget::ClickableContainer,
        "div" | "span" => ClickTarget::Container,
        "img" => ClickTarget::Image {
            alt: non_empty(&el.alt).map(str::to_string),
        },
        "li" => ClickTarget::ListItem,
        _ => ClickTarget::Other,
    }
}

fn is_clickable_container(el: &ElementSnapshot) -> bool {
    el.has_click_handler
        || el.role.eq_ignore_ascii_case("button")
        || el.has_class("btn")
        || el.has_class("button")
}

fn link_host(href: &str) -> Option<String> {
    if href.trim().is_empty() {
        return None;
    }
    url::Url::parse(href)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Visible text, preferring the first direct text node for mixed content.
pub fn element_text(el: &ElementSnapshot) -> String {
    let direct = el.text_content.trim();
    if !direct.is_empty() && !el.has_child_elements {
        return truncate(direct, TEXT_LIMIT);
    }
    if let Some(node) = el.text_nodes.iter().find_map(|t| non_empty(t)) {
        return truncate(node, TEXT_LIMIT);
    }
    truncate(direct, TEXT_LIMIT)
}

fn tag_based_description(el: &ElementSnapshot) -> String {
    if let Some(id) = non_empty(&el.id) {
        return format!("element with ID \"{id}\"");
    }
    if let Some(class) = el.classes().next() {
        return format!("{} with class \"{class}\"", el.tag());
    }
    el.tag()
}

/// First non-empty of: aria-label, title, visible text, placeholder, tag fallback.
pub fn identifier(el: &ElementSnapshot) -> String {
    let text = element_text(el);
    let id = [el.aria_label.as_str(), el.title.as_str(), text.as_str(), el.placeholder.as_str()]
        .into_iter()
        .find_map(non_empty)
        .map(str::to_string)
        .unwrap_or_else(|| tag_based_description(el));
    id
}

pub fn describe(
    element: Option<&ElementSnapshot>,
    action: ActionKind,
    scroll: &ScrollMetrics,
) -> String {
    if action == ActionKind::Scroll {
        return scroll_description(scroll);
    }
    let Some(el) = element else {
        return format!("Perform {action} on page");
    };
    let id = identifier(el);
    match action {
        ActionKind::Click => click_description(el, &id),
        ActionKind::Input => input_description(el, &id),
        ActionKind::Keypress => keypress_description(&id),
        ActionKind::Change => change_description(el),
        ActionKind::Submit => submit_description(el),
        _ => format!("Perform {action} on {id}"),
    }
}

pub fn click_description(el: &ElementSnapshot, id: &str) -> String {
    match classify_click_target(el) {
        ClickTarget::SubmitButton => format!("Submit form by clicking \"{id}\" button"),
        ClickTarget::Button | ClickTarget::ClickableContainer => {
            format!("Click \"{id}\" button")
        }
        ClickTarget::Link { host: Some(host) } => {
            format!("Navigate to {host} by clicking \"{id}\" link")
        }
        ClickTarget::Link { host: None } => format!("Click \"{id}\" link"),
        ClickTarget::Checkbox { checked } => {
            let verb = if checked { "Check" } else { "Uncheck" };
            format!("{verb} \"{id}\" checkbox")
        }
        ClickTarget::Radio => format!("Select \"{id}\" radio option"),
        ClickTarget::InputField => format!("Click on \"{id}\" input field"),
        ClickTarget::Dropdown => format!("Open \"{id}\" dropdown menu"),
        ClickTarget::Container => format!("Click on \"{id}\" element"),
        ClickTarget::Image { alt: Some(alt) } => format!("Click on \"{alt}\" image"),
        ClickTarget::Image { alt: None } => "Click on image".to_string(),
        ClickTarget::ListItem => format!("Select \"{id}\" from list"),
        ClickTarget::Other => format!("Click on \"{id}\""),
    }
}

pub fn input_description(el: &ElementSnapshot, id: &str) -> String {
    let field = non_empty(id)
        .or_else(|| non_empty(&el.placeholder))
        .unwrap_or("field");
    let value = el.value.as_str();
    let kind = if el.tag() == "textarea" {
        "textarea".to_string()
    } else {
        el.kind()
    };
    match kind.as_str() {
        "email" => format!("Enter email address \"{value}\" in {field}"),
        "password" => format!("Enter password in {field}"),
        "search" => format!("Search for \"{value}\" in {field}"),
        "tel" => format!("Enter phone number \"{value}\" in {field}"),
        "url" => format!("Enter URL \"{value}\" in {field}"),
        "number" => format!("Enter number \"{value}\" in {field}"),
        "date" => format!("Select date \"{value}\" in {field}"),
        "textarea" => {
            let shown = truncate(value, TEXTAREA_VALUE_LIMIT);
            let ellipsis = if value.chars().count() > TEXTAREA_VALUE_LIMIT {
                "..."
            } else {
                ""
            };
            format!("Enter text in {field}: \"{shown}{ellipsis}\"")
        }
        _ => format!("Enter \"{value}\" in {field}"),
    }
}

pub fn change_description(el: &ElementSnapshot) -> String {
    let option = el.selected_option.as_deref().unwrap_or_default();
    let from = non_empty(&el.name).unwrap_or("dropdown");
    format!("Select \"{option}\" from {from}")
}

pub fn submit_description(form: &ElementSnapshot) -> String {
    let name = non_empty(&form.name)
        .or_else(|| non_empty(&form.id))
        .unwrap_or("form");
    format!("Submit {name}")
}

pub fn scroll_description(metrics: &ScrollMetrics) -> String {
    format!("Scroll down to {}% of the page", metrics.percent())
}

pub fn keypress_description(id: &str) -> String {
    let target = non_empty(id).unwrap_or("current field");
    format!("Press Enter key in {target}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(tag: &str) -> ElementSnapshot {
        ElementSnapshot::new(tag)
    }

    fn labelled(tag: &str, text: &str) -> ElementSnapshot {
        let mut e = el(tag);
        e.text_content = text.into();
        e
    }

    fn no_scroll() -> ScrollMetrics {
        ScrollMetrics::default()
    }

    #[test]
    fn submit_button_by_text() {
        let mut button = labelled("BUTTON", "Save");
        button.input_type = "submit".into();
        assert_eq!(
            describe(Some(&button), ActionKind::Click, &no_scroll()),
            "Submit form by clicking \"Save\" button"
        );
    }

    #[test]
    fn identifier_priority() {
        let mut e = labelled("button", "Text");
        e.placeholder = "Placeholder".into();
        assert_eq!(identifier(&e), "Text");
        e.title = "Title".into();
        assert_eq!(identifier(&e), "Title");
        e.aria_label = "Aria".into();
        assert_eq!(identifier(&e), "Aria");
    }

    #[test]
    fn identifier_falls_back_to_placeholder_then_tag() {
        let mut e = el("input");
        e.placeholder = "Your email".into();
        assert_eq!(identifier(&e), "Your email");
        e.placeholder.clear();
        e.class_name = "field big".into();
        assert_eq!(identifier(&e), "input with class \"field\"");
        e.id = "email".into();
        assert_eq!(identifier(&e), "element with ID \"email\"");
        assert_eq!(identifier(&el("section")), "section");
    }

    #[test]
    fn mixed_content_prefers_first_text_node() {
        let mut e = labelled("a", "  Docs  Read the guide ");
        e.has_child_elements = true;
        e.text_nodes = vec!["   ".into(), " Docs ".into(), "later".into()];
        assert_eq!(element_text(&e), "Docs");
    }

    #[test]
    fn text_is_truncated_to_100_chars() {
        let e = labelled("p", &"ä".repeat(150));
        assert_eq!(element_text(&e).chars().count(), 100);
    }

    #[test]
    fn link_includes_host() {
        let mut a = labelled("a", "Pricing");
        a.href = "https://shop.example.com/pricing?x=1".into();
        assert_eq!(
            describe(Some(&a), ActionKind::Click, &no_scroll()),
            "Navigate to shop.example.com by clicking \"Pricing\" link"
        );
        a.href.clear();
        assert_eq!(
            describe(Some(&a), ActionKind::Click, &no_scroll()),
            "Click \"Pricing\" link"
        );
    }

    #[test]
    fn checkbox_reflects_checked_state() {
        let mut c = el("input");
        c.input_type = "checkbox".into();
        c.aria_label = "Remember me".into();
        c.checked = true;
        assert_eq!(click_description(&c, "Remember me"), "Check \"Remember me\" checkbox");
        c.checked = false;
        assert_eq!(click_description(&c, "Remember me"), "Uncheck \"Remember me\" checkbox");
    }

    #[test]
    fn clickable_containers() {
        let mut d = labelled("div", "Open");
        assert_eq!(classify_click_target(&d), ClickTarget::Container);
        d.class_name = "card btn-primary".into();
        assert_eq!(classify_click_target(&d), ClickTarget::Container);
        d.class_name = "card btn".into();
        assert_eq!(classify_click_target(&d), ClickTarget::ClickableContainer);
        let mut s = labelled("span", "Go");
        s.role = "button".into();
        assert_eq!(click_description(&s, "Go"), "Click \"Go\" button");
        let mut h = labelled("span", "Go");
        h.has_click_handler = true;
        assert_eq!(classify_click_target(&h), ClickTarget::ClickableContainer);
    }

    #[test]
    fn image_and_list_item() {
        let mut img = el("img");
        assert_eq!(click_description(&img, "img"), "Click on image");
        img.alt = "Logo".into();
        assert_eq!(click_description(&img, "img"), "Click on \"Logo\" image");
        let li = labelled("li", "Blue");
        assert_eq!(
            describe(Some(&li), ActionKind::Click, &no_scroll()),
            "Select \"Blue\" from list"
        );
    }

    #[test]
    fn input_descriptions_by_type() {
        let mut e = el("input");
        e.placeholder = "Email".into();
        e.value = "a@b.c".into();
        e.input_type = "email".into();
        assert_eq!(
            describe(Some(&e), ActionKind::Input, &no_scroll()),
            "Enter email address \"a@b.c\" in Email"
        );
        e.input_type = "password".into();
        e.value = "secret".into();
        let desc = describe(Some(&e), ActionKind::Input, &no_scroll());
        assert_eq!(desc, "Enter password in Email");
        assert!(!desc.contains("secret"));
        e.input_type = "search".into();
        e.value = "rust".into();
        assert_eq!(input_description(&e, "Email"), "Search for \"rust\" in Email");
        e.input_type = String::new();
        assert_eq!(input_description(&e, "Name"), "Enter \"rust\" in Name");
    }

    #[test]
    fn textarea_value_is_shortened() {
        let mut t = el("textarea");
        t.value = "y".repeat(60);
        let desc = input_description(&t, "Comment");
        assert_eq!(desc, format!("Enter text in Comment: \"{}...\"", "y".repeat(50)));
        t.value = "short".into();
        assert_eq!(input_description(&t, "Comment"), "Enter text in Comment: \"short\"");
    }

    #[test]
    fn scroll_percentages() {
        let mut m = ScrollMetrics {
            scroll_y: 0.0,
            scroll_height: 2000.0,
            viewport_height: 1000.0,
        };
        assert_eq!(scroll_description(&m), "Scroll down to 0% of the page");
        m.scroll_y = 1000.0;
        assert_eq!(scroll_description(&m), "Scroll down to 100% of the page");
        m.scroll_y = 333.0;
        assert_eq!(m.percent(), 33);
    }

    #[test]
    fn scroll_on_short_page_reports_full() {
        let m = ScrollMetrics {
            scroll_y: 0.0,
            scroll_height: 800.0,
            viewport_height: 800.0,
        };
        assert_eq!(m.percent(), 100);
        assert_eq!(describe(None, ActionKind::Scroll, &m), "Scroll down to 100% of the page");
    }

    #[test]
    fn keypress_change_submit() {
        let mut field = el("input");
        field.placeholder = "Search".into();
        assert_eq!(
            describe(Some(&field), ActionKind::Keypress, &no_scroll()),
            "Press Enter key in Search"
        );
        let mut select = el("select");
        select.selected_option = Some("Germany".into());
        assert_eq!(change_description(&select), "Select \"Germany\" from dropdown");
        select.name = "country".into();
        assert_eq!(change_description(&select), "Select \"Germany\" from country");
        let mut form = el("form");
        assert_eq!(submit_description(&form), "Submit form");
        form.id = "signup".into();
        assert_eq!(submit_description(&form), "Submit signup");
    }

    #[test]
    fn unknown_action_uses_generic_template() {
        let e = labelled("button", "Save");
        assert_eq!(
            describe(Some(&e), ActionKind::Manual, &no_scroll()),
            "Perform manual on Save"
        );
    }
}
