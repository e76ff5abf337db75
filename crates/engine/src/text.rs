//! Positioned text extraction from page content streams.
//!
//! Walks the text-showing operators (`Tf`, `Td`/`TD`/`Tm`/`T*`, `Tj`/`TJ`,
//! `'`/`"`) and records one span per text run. Positions come from the text
//! matrix; widths use a 0.5 em-per-character estimate, good enough for a
//! selectable text layer but not for typography. PDF y grows upward from the
//! bottom, so span origins are flipped into top-left page-unit space before
//! they leave this module.

use lopdf::content::Content;
use lopdf::Object;

/// A text run with its page-unit bounding box (top-left origin, scale 1.0).
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextSpan {
    /// Whether this span's box intersects the given page-unit rectangle.
    pub fn intersects(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        self.x < x + width
            && x < self.x + self.width
            && self.y < y + height
            && y < self.y + self.height
    }
}

struct TextState {
    size: f32,
    leading: f32,
    line_x: f32,
    line_y: f32,
    cursor_x: f32,
}

impl TextState {
    fn new() -> Self {
        Self { size: 0.0, leading: 0.0, line_x: 0.0, line_y: 0.0, cursor_x: 0.0 }
    }

    fn begin_text(&mut self) {
        self.line_x = 0.0;
        self.line_y = 0.0;
        self.cursor_x = 0.0;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.line_x += tx;
        self.line_y += ty;
        self.cursor_x = self.line_x;
    }

    fn set_matrix(&mut self, e: f32, f: f32) {
        self.line_x = e;
        self.line_y = f;
        self.cursor_x = self.line_x;
    }

    fn next_line(&mut self) {
        self.line_y -= self.leading;
        self.cursor_x = self.line_x;
    }
}

pub(crate) fn spans_from_content(content: &[u8], page_height: f32) -> Vec<TextSpan> {
    let content = match Content::decode(content) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(%err, "content stream did not decode; text layer is empty");
            return Vec::new();
        }
    };

    let mut state = TextState::new();
    let mut spans = Vec::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => state.begin_text(),
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(as_number) {
                    state.size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(as_number) {
                    state.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) =
                    (operands.first().and_then(as_number), operands.get(1).and_then(as_number))
                {
                    state.translate(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) =
                    (operands.first().and_then(as_number), operands.get(1).and_then(as_number))
                {
                    state.leading = -ty;
                    state.translate(tx, ty);
                }
            }
            "Tm" => {
                if let (Some(e), Some(f)) =
                    (operands.get(4).and_then(as_number), operands.get(5).and_then(as_number))
                {
                    state.set_matrix(e, f);
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(as_text) {
                    emit(&mut spans, &mut state, page_height, text, 0.0);
                }
            }
            "'" => {
                state.next_line();
                if let Some(text) = operands.first().and_then(as_text) {
                    emit(&mut spans, &mut state, page_height, text, 0.0);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(text) = operands.get(2).and_then(as_text) {
                    emit(&mut spans, &mut state, page_height, text, 0.0);
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = operands.first() {
                    let mut text = String::new();
                    let mut kerning = 0.0f32;
                    for element in elements {
                        match element {
                            Object::String(_, _) => {
                                if let Some(part) = as_text(element) {
                                    text.push_str(&part);
                                }
                            }
                            _ => {
                                if let Some(adjust) = as_number(element) {
                                    // Negative TJ numbers move the cursor
                                    // forward by adjust/1000 em.
                                    kerning -= adjust / 1000.0 * state.size;
                                }
                            }
                        }
                    }
                    emit(&mut spans, &mut state, page_height, text, kerning);
                }
            }
            _ => {}
        }
    }

    spans
}

fn emit(
    spans: &mut Vec<TextSpan>,
    state: &mut TextState,
    page_height: f32,
    text: String,
    extra_advance: f32,
) {
    if text.is_empty() || state.size <= 0.0 {
        return;
    }

    let width = text.chars().count() as f32 * state.size * 0.5 + extra_advance;
    // line_y is the baseline in bottom-left space; ascent approximated at
    // 0.8 em when flipping to a top-left box.
    let top = page_height - state.line_y - state.size * 0.8;

    spans.push(TextSpan {
        text,
        x: state.cursor_x,
        y: top,
        width: width.max(0.0),
        height: state.size,
    });

    state.cursor_x += width.max(0.0);
}

fn as_number(object: &Object) -> Option<f32> {
    object.as_float().ok()
}

fn as_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}
