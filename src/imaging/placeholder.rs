//! Placeholder ("broken image") rendering.
//!
//! A placeholder is a canvas of the requested size in the requested color
//! with a broken-image icon composited in the centre at 70% opacity, shrunk
//! to at most 75% of the canvas. The icon is either a configured image file
//! or a glyph drawn here.

use super::backend::{RasterBackend, Rgba};
use super::calculations::{Dimension, ResizeMode, scale_length};
use super::operations::{Canvas, Result};
use crate::options::RenderOptions;
use std::path::Path;
use tracing::{debug, warn};

/// A 1x1 fully transparent GIF.
pub const EMPTY_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

pub const ICON_SCALE: f64 = 0.75;
pub const ICON_OPACITY: u32 = 70;

/// Side of the built-in glyph.
pub const GLYPH_SIZE: u32 = 128;

const GLYPH_MARGIN: u32 = 8;
const GLYPH_BORDER: u32 = 6;
const FRAME: Rgba = Rgba::opaque(140, 140, 140);
const PAPER: Rgba = Rgba::opaque(228, 228, 228);
const SUN: Rgba = Rgba::opaque(176, 176, 176);
const MOUNTAIN: Rgba = Rgba::opaque(112, 112, 112);

/// Placeholder dimensions: the requested box, square on the one given side,
/// or `fallback` square when neither is set.
pub fn placeholder_size(options: &RenderOptions, fallback: u32) -> (u32, u32) {
    match (options.width(), options.height()) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w),
        (None, Some(h)) => (h, h),
        (None, None) => (fallback, fallback),
    }
}

/// Color of the built-in glyph at `(x, y)`; `None` is transparent.
fn glyph_pixel(x: u32, y: u32) -> Option<Rgba> {
    let inner_end = GLYPH_SIZE - GLYPH_MARGIN;
    if x < GLYPH_MARGIN || y < GLYPH_MARGIN || x >= inner_end || y >= inner_end {
        return None;
    }

    // The crack runs corner to corner along the anti-diagonal.
    let diagonal = (x + y) as i64 - GLYPH_SIZE as i64;
    if diagonal.abs() <= 2 {
        return None;
    }

    let border_end = inner_end - GLYPH_BORDER;
    let start = GLYPH_MARGIN + GLYPH_BORDER;
    if x < start || y < start || x >= border_end || y >= border_end {
        return Some(FRAME);
    }

    let (dx, dy) = (x as i64 - 44, y as i64 - 42);
    if dx * dx + dy * dy <= 12 * 12 {
        return Some(SUN);
    }

    // Mountain: apex (64, 52), base on y = 108 from x = 22 to x = 106.
    let rise = (x as i64 - 64).abs() * 56 / 42;
    if (y as i64) >= 52 + rise && y < 108 {
        return Some(MOUNTAIN);
    }

    Some(PAPER)
}

/// Draw the built-in broken-image glyph.
pub fn builtin_icon(backend: &impl RasterBackend) -> Result<Canvas> {
    let mut icon = Canvas::blank(backend, GLYPH_SIZE, GLYPH_SIZE, Rgba::TRANSPARENT)?;
    backend.set_alpha_blending(icon.raster_mut(), false);
    for y in 0..GLYPH_SIZE {
        for x in 0..GLYPH_SIZE {
            if let Some(color) = glyph_pixel(x, y) {
                backend.set_pixel(icon.raster_mut(), x, y, color);
            }
        }
    }
    backend.set_alpha_blending(icon.raster_mut(), true);
    Ok(icon)
}

/// Load the configured icon, falling back to the built-in glyph when it is
/// unset, missing or undecodable.
pub fn load_icon(backend: &impl RasterBackend, custom: Option<&Path>) -> Result<Canvas> {
    if let Some(path) = custom {
        match std::fs::read(path) {
            Ok(bytes) => match Canvas::decode(backend, &bytes) {
                Ok(icon) => return Ok(icon),
                Err(e) => warn!(icon = %path.display(), error = %e, "placeholder icon undecodable"),
            },
            Err(e) => debug!(icon = %path.display(), error = %e, "placeholder icon unavailable"),
        }
    }
    builtin_icon(backend)
}

/// Render a placeholder for `options` with `icon` centred on it.
pub fn build_placeholder(
    backend: &impl RasterBackend,
    options: &RenderOptions,
    icon: Canvas,
    fallback: u32,
) -> Result<Canvas> {
    let (width, height) = placeholder_size(options, fallback);
    debug!(width, height, color = options.canvas_color(), "building placeholder");

    let icon = icon.resize(
        backend,
        Some(Dimension::Pixels(scale_length(width, ICON_SCALE) as i64)),
        Some(Dimension::Pixels(scale_length(height, ICON_SCALE) as i64)),
        ResizeMode::Fit,
        true,
    )?;

    let color = Rgba::from_hex(options.canvas_color()).unwrap_or(Rgba::WHITE);
    let mut canvas = Canvas::blank(backend, width, height, color)?;
    backend.to_truecolor(canvas.raster_mut());
    backend.flood_fill(canvas.raster_mut(), 0, 0, color);

    let center = Dimension::Percent(50.0);
    canvas.place(backend, &icon, center, center, ICON_OPACITY)?;
    Ok(canvas)
}
