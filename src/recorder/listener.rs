//! Event classification and per-session dedup policy.
//!
//! [`classify`] turns a raw [`PageEvent`] into what the recorder should do
//! with it. Debounced events (input, scroll) come back as scheduling
//! decisions; the agent owns the timers and calls [`FieldStates::input_settled`]
//! when a field's quiet period elapses.

use std::collections::HashMap;

use super::describe::{self, ScrollMetrics};
use super::element::{ElementSnapshot, FieldKey};
use super::event::{PageEvent, PageEventKind};
use super::types::ActionKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldState {
    pub clicked: bool,
    pub input_captured: bool,
}

/// Interaction state of the text fields touched in the current session.
#[derive(Debug, Default)]
pub struct FieldStates {
    fields: HashMap<FieldKey, FieldState>,
}

impl FieldStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FieldKey) -> FieldState {
        self.fields.get(key).copied().unwrap_or_default()
    }

    fn entry(&mut self, key: FieldKey) -> &mut FieldState {
        self.fields.entry(key).or_default()
    }

    /// Marks the field clicked. Returns `false` if it already was.
    pub fn mark_clicked(&mut self, key: FieldKey) -> bool {
        let state = self.entry(key);
        !std::mem::replace(&mut state.clicked, true)
    }

    /// Called when a field's input debounce fires. Yields the capture only
    /// the first time per field.
    pub fn input_settled(&mut self, element: &ElementSnapshot) -> Option<CaptureRequest> {
        let state = self.entry(element.field_key());
        if std::mem::replace(&mut state.input_captured, true) {
            return None;
        }
        Some(CaptureRequest::for_element(ActionKind::Input, element.clone()))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// A classified event ready to become a step.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub action: ActionKind,
    pub element: Option<ElementSnapshot>,
    pub description: String,
}

impl CaptureRequest {
    pub fn for_element(action: ActionKind, element: ElementSnapshot) -> Self {
        let description = describe::describe(Some(&element), action, &ScrollMetrics::default());
        Self {
            action,
            element: Some(element),
            description,
        }
    }

    pub fn scroll(metrics: &ScrollMetrics) -> Self {
        Self {
            action: ActionKind::Scroll,
            element: None,
            description: describe::scroll_description(metrics),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoTarget,
    RepeatFieldClick,
    FocusOnNonTextField,
    FieldAlreadyClicked,
    InputAlreadyCaptured,
    NotASelect,
    NotEnter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Capture(CaptureRequest),
    /// (Re)start the input quiet period for this field.
    DebounceInput {
        key: FieldKey,
        element: ElementSnapshot,
    },
    /// (Re)start the scroll quiet period.
    DebounceScroll,
    Ignore(IgnoreReason),
}

pub fn classify(event: &PageEvent, fields: &mut FieldStates) -> Decision {
    if event.kind == PageEventKind::Scroll {
        return Decision::DebounceScroll;
    }
    let Some(target) = event.target.as_ref() else {
        return Decision::Ignore(IgnoreReason::NoTarget);
    };

    match &event.kind {
        PageEventKind::Click => {
            if target.is_text_like() && !fields.mark_clicked(target.field_key()) {
                return Decision::Ignore(IgnoreReason::RepeatFieldClick);
            }
            Decision::Capture(CaptureRequest::for_element(ActionKind::Click, target.clone()))
        }
        PageEventKind::Focus => {
            if !target.is_text_like() {
                return Decision::Ignore(IgnoreReason::FocusOnNonTextField);
            }
            // keyboard navigation into a field counts as its first click
            if !fields.mark_clicked(target.field_key()) {
                return Decision::Ignore(IgnoreReason::FieldAlreadyClicked);
            }
            Decision::Capture(CaptureRequest::for_element(ActionKind::Click, target.clone()))
        }
        PageEventKind::Input => {
            let key = target.field_key();
            if fields.get(&key).input_captured {
                return Decision::Ignore(IgnoreReason::InputAlreadyCaptured);
            }
            Decision::DebounceInput {
                key,
                element: target.clone(),
            }
        }
        PageEventKind::Change => {
            if target.tag() != "select" {
                return Decision::Ignore(IgnoreReason::NotASelect);
            }
            Decision::Capture(CaptureRequest::for_element(ActionKind::Change, target.clone()))
        }
        PageEventKind::Keydown { key, shift } => {
            if key != "Enter" || *shift {
                return Decision::Ignore(IgnoreReason::NotEnter);
            }
            Decision::Capture(CaptureRequest::for_element(ActionKind::Keypress, target.clone()))
        }
        PageEventKind::Submit => {
            Decision::Capture(CaptureRequest::for_element(ActionKind::Submit, target.clone()))
        }
        PageEventKind::Scroll => Decision::DebounceScroll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(id: &str) -> ElementSnapshot {
        let mut el = ElementSnapshot::new("input");
        el.input_type = "text".into();
        el.id = id.into();
        el.placeholder = "Name".into();
        el
    }

    fn button(label: &str) -> ElementSnapshot {
        let mut el = ElementSnapshot::new("button");
        el.text_content = label.into();
        el
    }

    fn captured(decision: Decision) -> CaptureRequest {
        match decision {
            Decision::Capture(req) => req,
            other => panic!("expected capture, got {other:?}"),
        }
    }

    #[test]
    fn repeated_clicks_on_text_field_capture_once() {
        let mut fields = FieldStates::new();
        let field = text_field("name");
        let first = captured(classify(&PageEvent::click(field.clone()), &mut fields));
        assert_eq!(first.action, ActionKind::Click);
        assert_eq!(first.description, "Click on \"Name\" input field");
        for _ in 0..3 {
            assert_eq!(
                classify(&PageEvent::click(field.clone()), &mut fields),
                Decision::Ignore(IgnoreReason::RepeatFieldClick)
            );
        }
    }

    #[test]
    fn buttons_capture_every_click() {
        let mut fields = FieldStates::new();
        for _ in 0..3 {
            assert!(matches!(
                classify(&PageEvent::click(button("Next")), &mut fields),
                Decision::Capture(_)
            ));
        }
    }

    #[test]
    fn focus_acts_as_first_click() {
        let mut fields = FieldStates::new();
        let field = text_field("email");
        let req = captured(classify(&PageEvent::focus(field.clone()), &mut fields));
        assert_eq!(req.action, ActionKind::Click);
        assert_eq!(
            classify(&PageEvent::click(field.clone()), &mut fields),
            Decision::Ignore(IgnoreReason::RepeatFieldClick)
        );
        assert_eq!(
            classify(&PageEvent::focus(field), &mut fields),
            Decision::Ignore(IgnoreReason::FieldAlreadyClicked)
        );
    }

    #[test]
    fn click_then_focus_is_one_step() {
        let mut fields = FieldStates::new();
        let field = text_field("q");
        assert!(matches!(
            classify(&PageEvent::click(field.clone()), &mut fields),
            Decision::Capture(_)
        ));
        assert!(matches!(
            classify(&PageEvent::focus(field), &mut fields),
            Decision::Ignore(_)
        ));
    }

    #[test]
    fn focus_on_button_is_ignored() {
        let mut fields = FieldStates::new();
        assert_eq!(
            classify(&PageEvent::focus(button("Ok")), &mut fields),
            Decision::Ignore(IgnoreReason::FocusOnNonTextField)
        );
    }

    #[test]
    fn input_is_debounced_and_captured_once() {
        let mut fields = FieldStates::new();
        let mut field = text_field("city");
        field.value = "Ber".into();
        let decision = classify(&PageEvent::input(field.clone()), &mut fields);
        assert!(matches!(decision, Decision::DebounceInput { ref key, .. } if key.0 == "id:city"));

        field.value = "Berlin".into();
        let req = fields.input_settled(&field).expect("first settle captures");
        assert_eq!(req.description, "Enter \"Berlin\" in Name");
        assert!(fields.input_settled(&field).is_none());
        assert_eq!(
            classify(&PageEvent::input(field), &mut fields),
            Decision::Ignore(IgnoreReason::InputAlreadyCaptured)
        );
    }

    #[test]
    fn change_only_for_select() {
        let mut fields = FieldStates::new();
        let mut select = ElementSnapshot::new("SELECT");
        select.selected_option = Some("Blue".into());
        select.name = "color".into();
        let req = captured(classify(&PageEvent::change(select), &mut fields));
        assert_eq!(req.action, ActionKind::Change);
        assert_eq!(req.description, "Select \"Blue\" from color");

        assert_eq!(
            classify(&PageEvent::change(text_field("x")), &mut fields),
            Decision::Ignore(IgnoreReason::NotASelect)
        );
    }

    #[test]
    fn only_plain_enter_is_a_keypress() {
        let mut fields = FieldStates::new();
        let field = text_field("search");
        assert_eq!(
            classify(&PageEvent::keydown(field.clone(), "Enter", true), &mut fields),
            Decision::Ignore(IgnoreReason::NotEnter)
        );
        assert_eq!(
            classify(&PageEvent::keydown(field.clone(), "a", false), &mut fields),
            Decision::Ignore(IgnoreReason::NotEnter)
        );
        let req = captured(classify(&PageEvent::keydown(field, "Enter", false), &mut fields));
        assert_eq!(req.action, ActionKind::Keypress);
        assert_eq!(req.description, "Press Enter key in Name");
    }

    #[test]
    fn submit_and_scroll() {
        let mut fields = FieldStates::new();
        let mut form = ElementSnapshot::new("form");
        form.name = "checkout".into();
        let req = captured(classify(&PageEvent::submit(form), &mut fields));
        assert_eq!(req.description, "Submit checkout");
        assert_eq!(classify(&PageEvent::scroll(), &mut fields), Decision::DebounceScroll);
    }

    #[test]
    fn clear_resets_field_state() {
        let mut fields = FieldStates::new();
        let field = text_field("name");
        classify(&PageEvent::click(field.clone()), &mut fields);
        fields.clear();
        assert!(matches!(
            classify(&PageEvent::click(field), &mut fields),
            Decision::Capture(_)
        ));
    }
}
