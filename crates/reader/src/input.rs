//! Gesture capture.
//!
//! Turns pointer and text-selection events into annotation records. All
//! geometry is converted to page units at the moment of capture, so a
//! gesture recorded at one zoom replays correctly at any other. Two
//! recognizers exist, draw and selection, made mutually exclusive by the
//! active tool; note entry is an explicit modal state, not a blocking
//! prompt.

use marginalia_core::{Annotation, PagePoint, PageRect, ScreenPoint};
use marginalia_engine::TextSpan;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Highlight,
    Draw,
    Note,
}

/// What a finalized selection produced.
#[derive(Debug)]
pub enum SelectionOutcome {
    /// A highlight annotation, ready to append to the store.
    Committed(Annotation),
    /// The note tool needs its text; the capture is in the modal state and
    /// resolves through [`InputCapture::submit_note`] or
    /// [`InputCapture::cancel_note`].
    AwaitingNote,
    /// Nothing was committed: empty selection, no recoverable text, the
    /// draw tool is active, or another gesture is still running.
    Ignored,
}

#[derive(Debug)]
struct PendingNote {
    page: u32,
    rect: PageRect,
    selection: String,
}

/// Per-reader gesture recognizer state.
#[derive(Debug, Default)]
pub struct InputCapture {
    tool: Tool,
    stroke: Option<Vec<PagePoint>>,
    pending_note: Option<PendingNote>,
}

impl InputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch the active tool. Ignored (returns false) while a draw gesture
    /// or the note modal is active, so a gesture always finishes under the
    /// tool it started with.
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        if self.gesture_active() {
            debug!(?tool, "tool change ignored mid-gesture");
            return false;
        }
        self.tool = tool;
        true
    }

    pub fn gesture_active(&self) -> bool {
        self.stroke.is_some() || self.pending_note.is_some()
    }

    pub fn awaiting_note_text(&self) -> bool {
        self.pending_note.is_some()
    }

    /// Pointer press. Starts a stroke when the draw tool is active;
    /// otherwise the press belongs to the host selection mechanism.
    pub fn press(&mut self, point: ScreenPoint, scale: f32) {
        if self.tool != Tool::Draw || self.gesture_active() {
            return;
        }
        self.stroke = Some(vec![point.to_page_units(scale)]);
    }

    /// Pointer move while pressed; appends to the active stroke.
    pub fn drag(&mut self, point: ScreenPoint, scale: f32) {
        if let Some(stroke) = &mut self.stroke {
            stroke.push(point.to_page_units(scale));
        }
    }

    /// Pointer release. A path of at least two points commits a draw
    /// annotation; a bare click commits nothing.
    pub fn release(&mut self, page: u32) -> Option<Annotation> {
        let stroke = self.stroke.take()?;
        if stroke.len() < 2 {
            debug!("single-point stroke discarded");
            return None;
        }
        Some(Annotation::draw(page, stroke))
    }

    /// The in-progress stroke, for the disposable preview layer.
    pub fn preview_path(&self) -> Option<&[PagePoint]> {
        self.stroke.as_deref()
    }

    /// A finalized text selection, delivered as the drag's two screen-space
    /// corners. Recovers the selected text from the page's text layer; an
    /// empty recovery cancels the gesture.
    pub fn finalize_selection(
        &mut self,
        page: u32,
        start: ScreenPoint,
        end: ScreenPoint,
        scale: f32,
        text_layer: &[TextSpan],
    ) -> SelectionOutcome {
        if self.gesture_active() || self.tool == Tool::Draw {
            return SelectionOutcome::Ignored;
        }

        let rect = PageRect::from_corners(start.to_page_units(scale), end.to_page_units(scale));
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return SelectionOutcome::Ignored;
        }

        let selection = recover_text(rect, text_layer);
        if selection.is_empty() {
            debug!("selection covers no text, nothing committed");
            return SelectionOutcome::Ignored;
        }

        match self.tool {
            Tool::Highlight => {
                SelectionOutcome::Committed(Annotation::highlight(page, rect, selection))
            }
            Tool::Note => {
                self.pending_note = Some(PendingNote { page, rect, selection });
                SelectionOutcome::AwaitingNote
            }
            Tool::Draw => SelectionOutcome::Ignored,
        }
    }

    /// Resolve the note modal with the entered text. Blank input commits
    /// nothing; either way the modal state is exited.
    pub fn submit_note(&mut self, note: &str) -> Option<Annotation> {
        let pending = self.pending_note.take()?;
        let note = note.trim();
        if note.is_empty() {
            return None;
        }
        let text = format!("{} -> {}", pending.selection, note);
        Some(Annotation::anchored_note(pending.page, pending.rect, text))
    }

    /// Leave the note modal without committing anything.
    pub fn cancel_note(&mut self) {
        self.pending_note = None;
    }
}

/// Concatenation, in layout order, of the spans intersecting the selection
/// rectangle.
fn recover_text(rect: PageRect, text_layer: &[TextSpan]) -> String {
    let mut hits: Vec<&TextSpan> = text_layer
        .iter()
        .filter(|span| span.intersects(rect.x, rect.y, rect.width, rect.height))
        .collect();
    hits.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    hits.iter().map(|span| span.text.as_str()).collect::<Vec<_>>().join(" ")
}
