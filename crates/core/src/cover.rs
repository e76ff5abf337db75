//! Synthetic cover generation.
//!
//! Purely decorative: a diagonal gradient from a small accent palette down
//! to a dark base, with a faint hatch pattern. Deterministic for a given
//! title so re-imports produce the same cover.

use image::Rgba;
use marginalia_engine::RgbaImage;

pub const COVER_WIDTH: u32 = 600;
pub const COVER_HEIGHT: u32 = 800;

const PALETTE: [[u8; 3]; 5] = [
    [0x4f, 0x46, 0xe5],
    [0x3b, 0x82, 0xf6],
    [0x8b, 0x5c, 0xf6],
    [0xec, 0x48, 0x99],
    [0xf9, 0x73, 0x16],
];
const BASE: [u8; 3] = [0x1e, 0x1b, 0x4b];

pub fn synthesize_cover(title: &str) -> RgbaImage {
    let accent = PALETTE[palette_index(title)];
    let mut cover = RgbaImage::new(COVER_WIDTH, COVER_HEIGHT);
    for (x, y, pixel) in cover.enumerate_pixels_mut() {
        let t = (x + y) as f32 / (COVER_WIDTH + COVER_HEIGHT) as f32;
        let channel = |index: usize| {
            let from = accent[index] as f32;
            let to = BASE[index] as f32;
            (from + (to - from) * t).round() as u8
        };
        let (r, g, b) = (channel(0), channel(1), channel(2));
        *pixel = if on_hatch_line(x, y) {
            // 10% white over the gradient.
            Rgba([lighten(r), lighten(g), lighten(b), 255])
        } else {
            Rgba([r, g, b, 255])
        };
    }
    cover
}

fn palette_index(title: &str) -> usize {
    let sum: u32 = title.bytes().map(u32::from).sum();
    sum as usize % PALETTE.len()
}

/// Steep diagonal hatch lines spaced 40 px apart along the x axis.
fn on_hatch_line(x: u32, y: u32) -> bool {
    (x as i32 - y as i32 / 4).rem_euclid(40) == 0
}

fn lighten(channel: u8) -> u8 {
    channel.saturating_add(((255 - channel as u16) / 10) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_has_fixed_dimensions() {
        let cover = synthesize_cover("Any Title");
        assert_eq!(cover.dimensions(), (COVER_WIDTH, COVER_HEIGHT));
    }

    #[test]
    fn test_cover_is_deterministic_per_title() {
        let first = synthesize_cover("Walden");
        let second = synthesize_cover("Walden");
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_titles_can_pick_different_accents() {
        // "A" and "B" land on adjacent palette entries.
        let a = synthesize_cover("A");
        let b = synthesize_cover("B");
        assert_ne!(a.get_pixel(300, 1), b.get_pixel(300, 1));
    }

    #[test]
    fn test_gradient_darkens_toward_the_bottom_right() {
        let cover = synthesize_cover("Gradient");
        let sum = |p: &Rgba<u8>| p.0[0] as u32 + p.0[1] as u32 + p.0[2] as u32;
        // Sample off the hatch lines.
        assert!(sum(cover.get_pixel(1, 2)) > sum(cover.get_pixel(598, 797)));
    }
}
