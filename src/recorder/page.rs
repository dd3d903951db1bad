//! The recorded page as seen by the recorder.

use super::describe::ScrollMetrics;
use super::element::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HighlightId(pub u64);

/// Overlay drawn over the target element while its step is captured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    pub rect: Rect,
}

impl Highlight {
    pub fn around(rect: Rect) -> Self {
        Self { rect }
    }

    /// Inline style for the overlay element. It never takes pointer events,
    /// so hit-testing on the page is unchanged while it is shown.
    pub fn style(&self) -> String {
        format!(
            "position: fixed; top: {}px; left: {}px; width: {}px; height: {}px; \
             border: 3px solid #3b82f6; border-radius: 6px; \
             background-color: rgba(59, 130, 246, 0.1); pointer-events: none; z-index: 10001;",
            self.rect.y, self.rect.x, self.rect.width, self.rect.height
        )
    }
}

pub trait PageContext: Send + Sync {
    fn url(&self) -> String;
    fn scroll_metrics(&self) -> ScrollMetrics;
    fn show_highlight(&self, highlight: &Highlight) -> HighlightId;
    fn remove_highlight(&self, id: HighlightId);
}
