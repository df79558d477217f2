//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Requested sizes and offsets come in as [`Dimension`]s, which are either an
//! absolute pixel count or a percentage of some reference length. What the
//! percentage refers to depends on the function:
//!
//! | Function | Size percent of | Offset percent of |
//! |---|---|---|
//! | [`resize_target`] | source dimension | n/a |
//! | [`cutout_rect`] | source dimension | `source - cutout` |
//! | [`resolve_offset`] (placement) | n/a | `background - foreground` |

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("both width and height required for stretching")]
    StretchNeedsBoth,
    #[error("at least one dimension required")]
    NeedsDimension,
    #[error("source image has no pixels ({0}x{1})")]
    EmptySource(u32, u32),
}

/// A length given either in pixels or as a percentage.
///
/// Negative values are meaningful: a negative resize dimension requests a
/// flip along that axis, a negative cutout offset shrinks the cutout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Pixels(i64),
    Percent(f64),
}

impl Dimension {
    /// Resolve against `reference`, keeping the sign.
    pub fn resolve(self, reference: u32) -> i64 {
        match self {
            Dimension::Pixels(px) => px,
            Dimension::Percent(pct) => (reference as f64 / 100.0 * pct).round() as i64,
        }
    }

    pub fn is_percent(self) -> bool {
        matches!(self, Dimension::Percent(_))
    }

    pub fn is_negative(self) -> bool {
        match self {
            Dimension::Pixels(px) => px < 0,
            Dimension::Percent(pct) => pct < 0.0,
        }
    }

    pub fn abs(self) -> Self {
        match self {
            Dimension::Pixels(px) => Dimension::Pixels(px.abs()),
            Dimension::Percent(pct) => Dimension::Percent(pct.abs()),
        }
    }
}

impl From<u32> for Dimension {
    fn from(px: u32) -> Self {
        Dimension::Pixels(px as i64)
    }
}

/// How a resize maps the source onto the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Proportional; result fits inside the box.
    #[default]
    Fit,
    /// Proportional; result covers the box, overflowing on one axis.
    Fill,
    /// Ignore aspect ratio; both dimensions required.
    Stretch,
    /// Fill, then centre-crop to the box. Geometrically identical to `Fill`
    /// here; the crop is applied by the caller via [`cutout_rect`].
    Exact,
}

/// Axis flip requested by negative resize dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    /// Flip implied by the signs of a resize request, if any.
    pub fn from_request(width: Option<Dimension>, height: Option<Dimension>) -> Option<Self> {
        let neg_w = width.is_some_and(Dimension::is_negative);
        let neg_h = height.is_some_and(Dimension::is_negative);
        match (neg_w, neg_h) {
            (true, true) => Some(Flip::Both),
            (true, false) => Some(Flip::Horizontal),
            (false, true) => Some(Flip::Vertical),
            (false, false) => None,
        }
    }
}

/// Axis-aligned rectangle inside a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Calculate output dimensions for a resize.
///
/// Signs are stripped first; percentages resolve against the source. When
/// both dimensions are percentages the resize becomes a stretch. A resolved
/// size of zero counts as absent.
///
/// # Arguments
/// * `source` - Source dimensions (width, height)
/// * `width`, `height` - Requested dimensions, either may be absent
/// * `mode` - Fit, fill, stretch or exact
/// * `shrink_only` - Never exceed the source on either axis
///
/// # Returns
/// * `(width, height)`, each at least 1
///
/// # Examples
/// ```
/// # use pictor::imaging::{Dimension, ResizeMode, resize_target};
/// // 1200x800 fitted into 450x300
/// let size = resize_target((1200, 800), Some(450.into()), Some(300.into()), ResizeMode::Fit, true);
/// assert_eq!(size, Ok((450, 300)));
///
/// // Fill covers the box: 100x200 into 300x300 → 300x600
/// let size = resize_target((100, 200), Some(300.into()), Some(300.into()), ResizeMode::Fill, false);
/// assert_eq!(size, Ok((300, 600)));
/// ```
pub fn resize_target(
    source: (u32, u32),
    width: Option<Dimension>,
    height: Option<Dimension>,
    mode: ResizeMode,
    shrink_only: bool,
) -> Result<(u32, u32), GeometryError> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return Err(GeometryError::EmptySource(src_w, src_h));
    }

    let both_percent =
        width.is_some_and(Dimension::is_percent) && height.is_some_and(Dimension::is_percent);
    let new_w = width.map(|w| w.abs().resolve(src_w)).unwrap_or(0);
    let new_h = height.map(|h| h.abs().resolve(src_h)).unwrap_or(0);

    let (out_w, out_h) = if mode == ResizeMode::Stretch || both_percent {
        if new_w == 0 || new_h == 0 {
            return Err(GeometryError::StretchNeedsBoth);
        }
        if shrink_only {
            (new_w.min(src_w as i64), new_h.min(src_h as i64))
        } else {
            (new_w, new_h)
        }
    } else {
        if new_w == 0 && new_h == 0 {
            return Err(GeometryError::NeedsDimension);
        }

        let mut scales = Vec::with_capacity(3);
        if new_w > 0 {
            scales.push(new_w as f64 / src_w as f64);
        }
        if new_h > 0 {
            scales.push(new_h as f64 / src_h as f64);
        }
        if matches!(mode, ResizeMode::Fill | ResizeMode::Exact) {
            let max = scales.iter().copied().fold(f64::MIN, f64::max);
            scales = vec![max];
        }
        if shrink_only {
            scales.push(1.0);
        }
        let scale = scales.iter().copied().fold(f64::MAX, f64::min);

        (
            (src_w as f64 * scale).round() as i64,
            (src_h as f64 * scale).round() as i64,
        )
    };

    Ok((clamp_to_u32(out_w).max(1), clamp_to_u32(out_h).max(1)))
}

/// Calculate the rectangle to cut out of a source image.
///
/// Sizes resolve against the source; offsets resolve against the remaining
/// space `source - size`. A negative offset shrinks the cutout by the
/// overflow and snaps to 0. The result is always inside the source and at
/// least 1x1.
///
/// # Examples
/// ```
/// # use pictor::imaging::{Dimension, Rect, cutout_rect};
/// // Centre 300x300 out of 300x600
/// let rect = cutout_rect(
///     (300, 600),
///     Dimension::Percent(50.0),
///     Dimension::Percent(50.0),
///     300.into(),
///     300.into(),
/// );
/// assert_eq!(rect, Rect { x: 0, y: 150, width: 300, height: 300 });
/// ```
pub fn cutout_rect(
    source: (u32, u32),
    left: Dimension,
    top: Dimension,
    width: Dimension,
    height: Dimension,
) -> Rect {
    let (src_w, src_h) = source;
    let (x, w) = cutout_axis(src_w, left, width);
    let (y, h) = cutout_axis(src_h, top, height);
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn cutout_axis(src: u32, offset: Dimension, size: Dimension) -> (u32, u32) {
    let src = src as i64;
    let mut size = size.resolve(src as u32);
    let mut offset = match offset {
        Dimension::Percent(pct) => ((src - size) as f64 / 100.0 * pct).round() as i64,
        Dimension::Pixels(px) => px,
    };

    if offset < 0 {
        size += offset;
        offset = 0;
    }

    let offset = offset.min((src - 1).max(0));
    let size = size.min(src - offset).max(1);
    (offset as u32, size as u32)
}

/// Resolve a placement offset against the free space `outer - inner`.
///
/// Pixel offsets pass through unchanged and may be negative (the foreground
/// then hangs off the edge).
pub fn resolve_offset(outer: u32, inner: u32, offset: Dimension) -> i64 {
    match offset {
        Dimension::Pixels(px) => px,
        Dimension::Percent(pct) => ((outer as i64 - inner as i64) as f64 / 100.0 * pct).round() as i64,
    }
}

/// Scale a length by a factor, for derived sizes like "75% of the target".
pub fn scale_length(length: u32, factor: f64) -> u32 {
    clamp_to_u32((length as f64 * factor).round() as i64)
}

fn clamp_to_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
