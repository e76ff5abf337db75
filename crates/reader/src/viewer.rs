//! Zoom and page state for one reading session.

pub const DEFAULT_ZOOM: f32 = 1.2;
pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.1;

/// Which page is shown at which zoom. Pure state; the owner issues a fresh
/// render request whenever either value changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerSession {
    page: u32,
    page_count: u32,
    scale: f32,
}

impl ViewerSession {
    pub fn new(page_count: u32) -> Self {
        Self { page: 1, page_count: page_count.max(1), scale: DEFAULT_ZOOM }
    }

    /// Current page, 1-based.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Current page as the engine's 0-based index.
    pub fn page_index(&self) -> u32 {
        self.page - 1
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Jump to a page, clamping out-of-range requests to the valid range.
    /// Returns whether the page actually changed.
    pub fn go_to(&mut self, page: u32) -> bool {
        let clamped = page.clamp(1, self.page_count);
        let changed = clamped != self.page;
        self.page = clamped;
        changed
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> bool {
        self.go_to(self.page.saturating_sub(1))
    }

    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.scale + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.scale - ZOOM_STEP)
    }

    /// Set the zoom factor, clamped to the supported range and snapped to
    /// the step grid so repeated stepping does not drift.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        let snapped = ((zoom * 10.0).round() / 10.0).clamp(MIN_ZOOM, MAX_ZOOM);
        let changed = snapped != self.scale;
        self.scale = snapped;
        changed
    }
}
