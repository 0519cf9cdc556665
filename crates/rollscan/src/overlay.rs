//! Diagnostic overlay rendering.
//!
//! Maps each pixel state to a fixed color so a whole analysis can be
//! inspected visually. Paper renders as its own neutral tone rather than
//! being left transparent, since the overlay stands alone as a PNG.

use image::{Rgb, RgbImage};

use crate::grid::{PixelGrid, PixelState};

/// Overlay color for one pixel state.
pub fn color_of(state: PixelState) -> Rgb<u8> {
    match state {
        PixelState::Paper => Rgb([90, 70, 50]),
        PixelState::NonPaper => Rgb([0, 255, 0]),
        PixelState::Margin => Rgb([0, 0, 255]),
        PixelState::HardMargin => Rgb([0, 64, 255]),
        PixelState::Preleader => Rgb([0, 128, 255]),
        PixelState::Leader => Rgb([0, 255, 255]),
        PixelState::PostLeader => Rgb([128, 128, 255]),
        PixelState::PostMusic => Rgb([128, 128, 255]),
        PixelState::Hole => Rgb([100, 149, 237]),
        PixelState::Antidust => Rgb([255, 128, 255]),
        PixelState::Tear => Rgb([255, 0, 255]),
        PixelState::BadHole => Rgb([255, 0, 255]),
        PixelState::BadHoleSkewed => Rgb([255, 20, 147]),
        PixelState::BadHoleAspect => Rgb([0, 255, 127]),
    }
}

/// Render the grid's pixel states to an RGB image.
pub fn render(grid: &PixelGrid) -> RgbImage {
    let mut img = RgbImage::new(grid.cols() as u32, grid.rows() as u32);
    for r in 0..grid.rows() {
        for c in 0..grid.cols() {
            img.put_pixel(c as u32, r as u32, color_of(grid.get(r, c)));
        }
    }
    img
}
