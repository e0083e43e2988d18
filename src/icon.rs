//! Application icon, drawn at startup
//!
//! A dark square with a blue frame and an "IP" mark. Used for both the tray
//! icon and the window icon.

use anyhow::Result;
use eframe::egui;
use image::{Rgba, RgbaImage};

const SIZE: u32 = 64;
const BACKGROUND: Rgba<u8> = Rgba([0x1b, 0x1f, 0x23, 0xff]);
const ACCENT: Rgba<u8> = Rgba([0x4f, 0xa3, 0xff, 0xff]);

fn fill_rect(image: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            image.put_pixel(x, y, color);
        }
    }
}

/// Draw the icon bitmap
pub fn draw() -> RgbaImage {
    let mut image = RgbaImage::from_pixel(SIZE, SIZE, BACKGROUND);

    // Frame, 3px wide, inset by 8px
    let (lo, hi) = (8, SIZE - 8);
    fill_rect(&mut image, lo, lo, hi, lo + 3, ACCENT);
    fill_rect(&mut image, lo, hi - 3, hi, hi, ACCENT);
    fill_rect(&mut image, lo, lo, lo + 3, hi, ACCENT);
    fill_rect(&mut image, hi - 3, lo, hi, hi, ACCENT);

    // I
    fill_rect(&mut image, 20, 20, 24, 44, ACCENT);

    // P
    fill_rect(&mut image, 28, 20, 32, 44, ACCENT);
    fill_rect(&mut image, 28, 20, 44, 24, ACCENT);
    fill_rect(&mut image, 40, 20, 44, 34, ACCENT);
    fill_rect(&mut image, 28, 30, 44, 34, ACCENT);

    image
}

/// Icon for the native window
pub fn for_window() -> egui::IconData {
    let image = draw();
    let (width, height) = image.dimensions();
    egui::IconData {
        rgba: image.into_raw(),
        width,
        height,
    }
}

/// Icon for the system tray
pub fn for_tray() -> Result<tray_icon::Icon> {
    let image = draw();
    let (width, height) = image.dimensions();
    Ok(tray_icon::Icon::from_rgba(image.into_raw(), width, height)?)
}
