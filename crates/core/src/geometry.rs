//! Coordinate model
//!
//! Annotations live in page-unit space: one coordinate system per page,
//! top-left origin, y increasing downward, independent of the current zoom.
//! Screen positions are page units multiplied by the zoom factor, so the
//! conversion happens exactly twice per annotation lifetime: divide at
//! capture, multiply at redraw.
//!
//! PDF-point space (bottom-left origin, y upward) has its own types. Values
//! of those types exist only inside the export projector and never reach the
//! annotation store.

use serde::{Deserialize, Serialize};

/// Position in device pixels at the current zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Divide out the zoom factor at the moment of capture.
    pub fn to_page_units(self, scale: f32) -> PagePoint {
        PagePoint::new(self.x / scale, self.y / scale)
    }
}

/// Rectangle in device pixels at the current zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn to_page_units(self, scale: f32) -> PageRect {
        PageRect {
            x: self.x / scale,
            y: self.y / scale,
            width: self.width / scale,
            height: self.height / scale,
        }
    }
}

/// Point in page-unit space.
///
/// Page units equal PDF points at zoom 1.0, so a page's reference size is
/// its PDF page size. Immutable once recorded on an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Multiply by the zoom factor at the moment of redraw.
    pub fn to_screen(self, scale: f32) -> ScreenPoint {
        ScreenPoint::new(self.x * scale, self.y * scale)
    }
}

/// Rectangle in page-unit space, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalized rectangle spanning two drag corners: min corner plus a
    /// positive extent regardless of drag direction.
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn to_screen(self, scale: f32) -> ScreenRect {
        ScreenRect {
            x: self.x * scale,
            y: self.y * scale,
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Point in the target document's native space: bottom-left origin, y
/// upward, units are PDF points. Export-only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

/// Rectangle in PDF-point space; `(x, y)` is the lower-left corner, as the
/// `re` content operator expects. Export-only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A page's extent in page units at zoom 1.0, captured when the document is
/// opened. The export projector derives its scale factors from this stored
/// value, never from a transient render surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSize {
    pub width: f32,
    pub height: f32,
}

impl ReferenceSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl From<marginalia_engine::PageSize> for ReferenceSize {
    fn from(size: marginalia_engine::PageSize) -> Self {
        Self::new(size.width_pt, size.height_pt)
    }
}

/// Projection from page-unit space onto one PDF page.
///
/// The x axis scales by `pdf_width / reference_width`; the y axis scales the
/// same way and then flips, because PDF y grows upward from the bottom edge.
#[derive(Debug, Clone, Copy)]
pub struct PdfProjection {
    scale_x: f32,
    scale_y: f32,
    pdf_height: f32,
}

impl PdfProjection {
    /// `reference` must be non-empty; the export projector validates that
    /// before constructing a projection.
    pub fn new(reference: ReferenceSize, pdf_width: f32, pdf_height: f32) -> Self {
        Self {
            scale_x: pdf_width / reference.width,
            scale_y: pdf_height / reference.height,
            pdf_height,
        }
    }

    pub fn project_point(&self, point: PagePoint) -> PdfPoint {
        PdfPoint {
            x: point.x * self.scale_x,
            y: self.pdf_height - point.y * self.scale_y,
        }
    }

    /// Rectangles flip with a height offset so the page-unit top edge maps
    /// to the PDF rectangle's upper edge.
    pub fn project_rect(&self, rect: PageRect) -> PdfRect {
        PdfRect {
            x: rect.x * self.scale_x,
            y: self.pdf_height - (rect.y + rect.height) * self.scale_y,
            width: rect.width * self.scale_x,
            height: rect.height * self.scale_y,
        }
    }
}
