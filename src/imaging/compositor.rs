//! Alpha-aware placement of one raster onto another.
//!
//! Opacity is applied on a 7-bit alpha scale where 0 is opaque and 127 fully
//! transparent. Each foreground alpha `a` becomes
//! `round(127 - (127 - a) * opacity / 100)`, so an opaque pixel at 70%
//! opacity ends up at 38 and a fully transparent one stays at 127. The
//! backends work in 8-bit alpha; [`to_alpha7`] and [`from_alpha7`] convert.

use super::backend::{BackendError, Raster, RasterBackend, Rgba};
use super::calculations::{Dimension, Rect, resolve_offset};
use tracing::debug;

/// 8-bit alpha (255 opaque) to 7-bit transparency (0 opaque).
pub fn to_alpha7(alpha: u8) -> u8 {
    127 - (alpha as f64 * 127.0 / 255.0).round() as u8
}

/// 7-bit transparency (0 opaque) back to 8-bit alpha (255 opaque).
pub fn from_alpha7(transparency: u8) -> u8 {
    let t = transparency.min(127);
    ((127 - t) as f64 * 255.0 / 127.0).round() as u8
}

/// Lookup table mapping 7-bit transparency under the given opacity.
fn opacity_table(opacity: u32) -> [u8; 128] {
    let mut table = [0u8; 128];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (127.0 - (127.0 - i as f64) * opacity as f64 / 100.0).round() as u8;
    }
    table
}

/// Place `foreground` onto `background` at `(left, top)` with `opacity`
/// percent (clamped to 0–100).
///
/// Percent offsets resolve against `background - foreground`, so `50%/50%`
/// centres. `opacity == 0` does nothing. The background's alpha blending is
/// switched on so existing alpha is combined rather than overwritten.
pub fn place(
    backend: &impl RasterBackend,
    background: &mut Raster,
    foreground: &Raster,
    left: Dimension,
    top: Dimension,
    opacity: u32,
) -> Result<(), BackendError> {
    let opacity = opacity.min(100);
    if opacity == 0 {
        return Ok(());
    }

    let (fg_w, fg_h) = foreground.dimensions();
    let x = resolve_offset(background.width(), fg_w, left);
    let y = resolve_offset(background.height(), fg_h, top);
    let whole = Rect {
        x: 0,
        y: 0,
        width: fg_w,
        height: fg_h,
    };

    debug!(x, y, opacity, width = fg_w, height = fg_h, "placing foreground");
    backend.set_alpha_blending(background, true);

    if opacity == 100 {
        backend.copy_region(background, foreground, x, y, whole);
        return Ok(());
    }

    let table = opacity_table(opacity);
    let mut faded = backend.blank(fg_w, fg_h, Rgba::TRANSPARENT)?;
    backend.set_alpha_blending(&mut faded, false);

    // Palette and alpha-less sources are flattened onto the transparent
    // buffer first and rescaled in place.
    let flatten = !foreground.is_truecolor();
    if flatten {
        backend.copy_region(&mut faded, foreground, 0, 0, whole);
    }

    for py in 0..fg_h {
        for px in 0..fg_w {
            let c = if flatten {
                backend.pixel(&faded, px, py)
            } else {
                backend.pixel(foreground, px, py)
            };
            let alpha = from_alpha7(table[to_alpha7(c.a) as usize]);
            backend.set_pixel(&mut faded, px, py, Rgba { a: alpha, ..c });
        }
    }

    backend.set_alpha_blending(&mut faded, true);
    backend.copy_region(background, &faded, x, y, whole);
    Ok(())
}
