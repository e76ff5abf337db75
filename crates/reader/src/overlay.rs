//! Annotation overlay compositing.
//!
//! Draws the stored annotation snapshot on top of a decoded page raster.
//! Geometry is stored in page units; every shape is multiplied by the
//! current scale on its way to pixels. Highlights go down first with a
//! multiply-like blend so the text underneath stays legible, then strokes
//! are painted opaquely over them.

use image::{Rgba, RgbaImage};
use marginalia_core::{AnnotationSet, PagePoint, ScreenRect};

const HIGHLIGHT_TINT: Rgba<u8> = Rgba([254, 240, 138, 255]);
const STROKE_FALLBACK: Rgba<u8> = Rgba([239, 68, 68, 255]);

/// Composite every annotation targeting `page` (1-based) onto the frame.
pub fn composite_annotations(
    frame: &mut RgbaImage,
    page: u32,
    annotations: &AnnotationSet,
    scale: f32,
) {
    for annotation in annotations.by_page(page) {
        if let Some(rect) = annotation.rect {
            let tint = parse_hex_color(&annotation.color).unwrap_or(HIGHLIGHT_TINT);
            blend_highlight(frame, rect.to_screen(scale), tint);
        }
    }
    for annotation in annotations.by_page(page) {
        if let Some(path) = &annotation.path {
            let color = parse_hex_color(&annotation.color).unwrap_or(STROKE_FALLBACK);
            stroke_path(frame, path, scale, color);
        }
    }
}

/// Disposable overlay for in-progress stroke feedback. The committed frame
/// is never painted here; on commit the preview is cleared and the owner
/// recomposites from the annotation snapshot.
pub struct StrokePreview {
    layer: RgbaImage,
}

impl StrokePreview {
    /// A fully transparent layer matching the frame's pixel size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { layer: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])) }
    }

    /// Repaint the whole preview from the gesture's current path.
    pub fn repaint(&mut self, path: &[PagePoint], scale: f32) {
        self.clear();
        stroke_path(&mut self.layer, path, scale, STROKE_FALLBACK);
    }

    pub fn clear(&mut self) {
        for pixel in self.layer.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }
}

/// Multiply-like blend at 50% opacity: each covered pixel moves halfway
/// toward `base * tint`, which darkens ink and tints paper without hiding
/// either.
fn blend_highlight(frame: &mut RgbaImage, rect: ScreenRect, tint: Rgba<u8>) {
    let x0 = rect.x.max(0.0).round() as u32;
    let y0 = rect.y.max(0.0).round() as u32;
    let x1 = ((rect.x + rect.width).round() as u32).min(frame.width());
    let y1 = ((rect.y + rect.height).round() as u32).min(frame.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = frame.get_pixel_mut(x, y);
            for channel in 0..3 {
                let base = pixel.0[channel] as u16;
                let multiplied = base * tint.0[channel] as u16 / 255;
                pixel.0[channel] = ((base + multiplied) / 2) as u8;
            }
        }
    }
}

/// Stroke the polyline with width `2 * scale`: discs stamped along each
/// segment give round caps and joins for free.
fn stroke_path(frame: &mut RgbaImage, path: &[PagePoint], scale: f32, color: Rgba<u8>) {
    let radius = scale.max(0.5);
    for pair in path.windows(2) {
        let a = pair[0].to_screen(scale);
        let b = pair[1].to_screen(scale);
        let steps = (b.x - a.x).hypot(b.y - a.y).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            stamp_disc(frame, a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t, radius, color);
        }
    }
}

fn stamp_disc(frame: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let reach = radius.ceil() as i64;
    let center_x = cx.round() as i64;
    let center_y = cy.round() as i64;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if (dx as f32).hypot(dy as f32) > radius {
                continue;
            }
            let x = center_x + dx;
            let y = center_y + dy;
            if x < 0 || y < 0 || x >= frame.width() as i64 || y >= frame.height() as i64 {
                continue;
            }
            frame.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Parse `#rrggbb` into an opaque color. Anything else is rejected.
fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some(Rgba([(value >> 16) as u8, (value >> 8) as u8, value as u8, 255]))
}
