//! High-level image operations.
//!
//! [`Canvas`] owns exactly one [`Raster`]. Geometry-changing operations
//! (`resize`, `crop`) consume the canvas and return a new one built on a
//! fresh raster; the old buffer is dropped with the consumed value.
//! [`render_variant`] maps a crop policy onto these operations.

use super::backend::{BackendError, Raster, RasterBackend, Rgba};
use super::calculations::{
    Dimension, Flip, GeometryError, Rect, ResizeMode, cutout_rect, resize_target, scale_length,
};
use super::compositor;
use super::format::ImageKind;
use crate::options::{CropPolicy, RenderOptions};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported file extension '{0}'")]
    UnsupportedFormat(String),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Fraction of the target box a canvas-fit thumbnail occupies.
pub const CANVAS_FIT_SCALE: f64 = 0.75;

/// An image being worked on. Owns its raster.
#[derive(Debug, Clone)]
pub struct Canvas {
    raster: Raster,
}

impl Canvas {
    pub fn decode(backend: &impl RasterBackend, bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            raster: backend.decode(bytes)?,
        })
    }

    /// A `width` x `height` canvas filled with `fill`.
    pub fn blank(backend: &impl RasterBackend, width: u32, height: u32, fill: Rgba) -> Result<Self> {
        Ok(Self {
            raster: backend.blank(width, height, fill)?,
        })
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn raster_mut(&mut self) -> &mut Raster {
        &mut self.raster
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Resize according to `mode`. Negative dimensions flip the result.
    ///
    /// `Exact` fills the box without the shrink-only cap, then centre-crops
    /// to the requested size.
    pub fn resize(
        self,
        backend: &impl RasterBackend,
        width: Option<Dimension>,
        height: Option<Dimension>,
        mode: ResizeMode,
        shrink_only: bool,
    ) -> Result<Self> {
        if mode == ResizeMode::Exact {
            let crop_w = width.map(Dimension::abs).ok_or(GeometryError::StretchNeedsBoth)?;
            let crop_h = height.map(Dimension::abs).ok_or(GeometryError::StretchNeedsBoth)?;
            let center = Dimension::Percent(50.0);
            return self
                .resize(backend, width, height, ResizeMode::Fill, false)?
                .crop(backend, center, center, crop_w, crop_h);
        }

        let source = self.raster.dimensions();
        let (new_w, new_h) = resize_target(source, width, height, mode, shrink_only)?;
        debug!(
            from_w = source.0,
            from_h = source.1,
            width = new_w,
            height = new_h,
            ?mode,
            "resize"
        );

        let mut canvas = if (new_w, new_h) != source {
            let mut resized = backend.blank(new_w, new_h, Rgba::TRANSPARENT)?;
            backend.resample(
                &mut resized,
                &self.raster,
                full_rect(new_w, new_h),
                full_rect(source.0, source.1),
            )?;
            Self { raster: resized }
        } else {
            self
        };

        if let Some(flip) = Flip::from_request(width, height) {
            backend.flip(&mut canvas.raster, flip);
        }
        Ok(canvas)
    }

    /// Cut out a rectangle. See [`cutout_rect`] for how offsets resolve.
    pub fn crop(
        self,
        backend: &impl RasterBackend,
        left: Dimension,
        top: Dimension,
        width: Dimension,
        height: Dimension,
    ) -> Result<Self> {
        let rect = cutout_rect(self.raster.dimensions(), left, top, width, height);
        debug!(x = rect.x, y = rect.y, width = rect.width, height = rect.height, "crop");

        let mut cut = backend.blank(rect.width, rect.height, Rgba::TRANSPARENT)?;
        backend.set_alpha_blending(&mut cut, false);
        backend.copy_region(&mut cut, &self.raster, 0, 0, rect);
        backend.set_alpha_blending(&mut cut, true);
        Ok(Self { raster: cut })
    }

    /// Place `foreground` onto this canvas. See [`compositor::place`].
    pub fn place(
        &mut self,
        backend: &impl RasterBackend,
        foreground: &Canvas,
        left: Dimension,
        top: Dimension,
        opacity: u32,
    ) -> Result<()> {
        compositor::place(backend, &mut self.raster, &foreground.raster, left, top, opacity)?;
        Ok(())
    }

    /// Encode at `quality`, clamped to the format's range.
    pub fn encode(
        &self,
        backend: &impl RasterBackend,
        kind: ImageKind,
        quality: Option<u32>,
    ) -> Result<Vec<u8>> {
        Ok(backend.encode(&self.raster, kind, kind.quality(quality))?)
    }
}

fn full_rect(width: u32, height: u32) -> Rect {
    Rect {
        x: 0,
        y: 0,
        width,
        height,
    }
}

fn px(value: u32) -> Dimension {
    Dimension::Pixels(value as i64)
}

/// Apply the crop-policy pipeline to a decoded source.
///
/// | Policy | Transform |
/// |---|---|
/// | `Original` | unchanged |
/// | `CanvasFit` | 75% proportional shrink, centred on a `canvas_color` box |
/// | `ExactFill` | fill, then centre-crop to the box |
/// | `ProportionalFit` | proportional shrink-only fit |
/// | `None` | proportional shrink-only, missing sides taken from the other |
pub fn render_variant(
    backend: &impl RasterBackend,
    source: Canvas,
    options: &RenderOptions,
) -> Result<Canvas> {
    let w = options.width();
    let h = options.height();

    match options.crop() {
        CropPolicy::Original => Ok(source),
        CropPolicy::CanvasFit => {
            let thumb = source.resize(
                backend,
                w.map(|w| px(scale_length(w, CANVAS_FIT_SCALE))),
                h.map(|h| px(scale_length(h, CANVAS_FIT_SCALE))),
                ResizeMode::Fit,
                true,
            )?;
            let canvas_w = w.or(h).unwrap_or(thumb.width());
            let canvas_h = h.or(w).unwrap_or(thumb.height());
            let fill = Rgba::from_hex(options.canvas_color()).unwrap_or(Rgba::WHITE);

            let mut canvas = Canvas::blank(backend, canvas_w, canvas_h, fill)?;
            let center = Dimension::Percent(50.0);
            canvas.place(backend, &thumb, center, center, 100)?;
            Ok(canvas)
        }
        CropPolicy::ExactFill => {
            let (src_w, src_h) = (source.width(), source.height());
            source.resize(
                backend,
                Some(px(w.or(h).unwrap_or(src_w))),
                Some(px(h.or(w).unwrap_or(src_h))),
                ResizeMode::Exact,
                true,
            )
        }
        CropPolicy::ProportionalFit => {
            source.resize(backend, w.map(px), h.map(px), ResizeMode::Fit, true)
        }
        CropPolicy::None => {
            let (src_w, src_h) = (source.width(), source.height());
            source.resize(
                backend,
                Some(px(w.or(h).unwrap_or(src_w))),
                Some(px(h.or(w).unwrap_or(src_h))),
                ResizeMode::Fit,
                true,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::rust_backend::RustBackend;
    use crate::options::{DimensionLimits, parse_options, parse_options_with};

    fn source(backend: &MockBackend) -> Canvas {
        Canvas::decode(backend, b"source").unwrap()
    }

    fn parse(args: &str) -> RenderOptions {
        parse_options(args, &DimensionLimits::default())
    }

    fn blanks(ops: &[RecordedOp]) -> Vec<(u32, u32)> {
        ops.iter()
            .filter_map(|op| match op {
                RecordedOp::Blank { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .collect()
    }

    // =========================================================================
    // Canvas::resize / crop
    // =========================================================================

    #[test]
    fn resize_replaces_raster() {
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let canvas = source(&backend)
            .resize(&backend, Some(px(600)), None, ResizeMode::Fit, false)
            .unwrap();
        assert_eq!((canvas.width(), canvas.height()), (600, 400));
        assert!(backend.get_operations().contains(&RecordedOp::Resample {
            dst: full_rect(600, 400),
            src: full_rect(1200, 800),
        }));
    }

    #[test]
    fn resize_to_same_size_skips_resample() {
        let backend = MockBackend::with_dimensions(vec![(100, 50)]);
        let canvas = source(&backend)
            .resize(&backend, Some(px(400)), None, ResizeMode::Fit, true)
            .unwrap();
        assert_eq!((canvas.width(), canvas.height()), (100, 50));
        assert!(
            !backend
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Resample { .. }))
        );
    }

    #[test]
    fn resize_negative_width_flips() {
        let backend = MockBackend::with_dimensions(vec![(200, 100)]);
        source(&backend)
            .resize(
                &backend,
                Some(Dimension::Pixels(-100)),
                None,
                ResizeMode::Fit,
                false,
            )
            .unwrap();
        assert_eq!(
            backend.get_operations().last(),
            Some(&RecordedOp::Flip(Flip::Horizontal))
        );
    }

    #[test]
    fn exact_fills_then_center_crops() {
        // 100x200 → fill 300x600 → crop 300x300 at y=150
        let backend = MockBackend::with_dimensions(vec![(100, 200)]);
        let canvas = source(&backend)
            .resize(&backend, Some(px(300)), Some(px(300)), ResizeMode::Exact, true)
            .unwrap();
        assert_eq!((canvas.width(), canvas.height()), (300, 300));

        let ops = backend.get_operations();
        assert!(ops.contains(&RecordedOp::CopyRegion {
            x: 0,
            y: 0,
            src: Rect {
                x: 0,
                y: 150,
                width: 300,
                height: 300
            }
        }));
    }

    #[test]
    fn exact_needs_both_dimensions() {
        let backend = MockBackend::with_dimensions(vec![(100, 200)]);
        let result = source(&backend).resize(&backend, Some(px(300)), None, ResizeMode::Exact, true);
        assert!(matches!(result, Err(RenderError::Geometry(_))));
    }

    #[test]
    fn crop_uses_cutout_rect() {
        let backend = MockBackend::with_dimensions(vec![(400, 300)]);
        let canvas = source(&backend)
            .crop(
                &backend,
                Dimension::Pixels(350),
                Dimension::Pixels(0),
                Dimension::Pixels(200),
                Dimension::Percent(50.0),
            )
            .unwrap();
        assert_eq!((canvas.width(), canvas.height()), (50, 150));
    }

    // =========================================================================
    // render_variant: policy table
    // =========================================================================

    #[test]
    fn canvas_fit_scenario() {
        // 1200x800, w600-h400-z1 → thumb 450x300 centred on 600x400 white
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let result = render_variant(&backend, source(&backend), &parse("w600-h400-z1-cffffff"))
            .unwrap();
        assert_eq!((result.width(), result.height()), (600, 400));

        let ops = backend.get_operations();
        assert_eq!(blanks(&ops), vec![(450, 300), (600, 400)]);
        assert!(ops.contains(&RecordedOp::Blank {
            width: 600,
            height: 400,
            fill: Rgba::WHITE
        }));
        assert!(ops.contains(&RecordedOp::CopyRegion {
            x: 75,
            y: 50,
            src: full_rect(450, 300)
        }));
    }

    #[test]
    fn canvas_fit_single_dimension_is_square() {
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let result = render_variant(&backend, source(&backend), &parse("w400-z1-c000000")).unwrap();
        assert_eq!((result.width(), result.height()), (400, 400));
        assert!(backend.get_operations().contains(&RecordedOp::Blank {
            width: 400,
            height: 400,
            fill: Rgba::opaque(0, 0, 0)
        }));
    }

    #[test]
    fn canvas_fit_never_upscales_thumb() {
        let backend = MockBackend::with_dimensions(vec![(100, 100)]);
        let result = render_variant(&backend, source(&backend), &parse("w600-h600-z1")).unwrap();
        assert_eq!((result.width(), result.height()), (600, 600));
        // Thumb stays at source size, no resample.
        assert_eq!(blanks(&backend.get_operations()), vec![(600, 600)]);
    }

    #[test]
    fn exact_fill_scenario() {
        let backend = MockBackend::with_dimensions(vec![(100, 200)]);
        let result = render_variant(&backend, source(&backend), &parse("z2-w300-h300")).unwrap();
        assert_eq!((result.width(), result.height()), (300, 300));
        assert_eq!(blanks(&backend.get_operations()), vec![(300, 600), (300, 300)]);
    }

    #[test]
    fn exact_fill_single_dimension_is_square() {
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let result = render_variant(&backend, source(&backend), &parse("z2-h100")).unwrap();
        assert_eq!((result.width(), result.height()), (100, 100));
    }

    #[test]
    fn proportional_fit_shrinks_only() {
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let result = render_variant(&backend, source(&backend), &parse("z3-w600-h600")).unwrap();
        assert_eq!((result.width(), result.height()), (600, 400));

        let backend = MockBackend::with_dimensions(vec![(300, 200)]);
        let result = render_variant(&backend, source(&backend), &parse("z3-w600-h600")).unwrap();
        assert_eq!((result.width(), result.height()), (300, 200));
    }

    #[test]
    fn default_policy_uses_single_dimension_for_both() {
        // w300 alone → box 300x300 → 1200x800 shrinks to 300x200
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let result = render_variant(&backend, source(&backend), &parse("w300")).unwrap();
        assert_eq!((result.width(), result.height()), (300, 200));

        // h300 alone also becomes a 300x300 box
        let backend = MockBackend::with_dimensions(vec![(1200, 800)]);
        let result = render_variant(&backend, source(&backend), &parse("h300")).unwrap();
        assert_eq!((result.width(), result.height()), (300, 200));
    }

    #[test]
    fn original_passes_through() {
        let backend = MockBackend::with_dimensions(vec![(1234, 567)]);
        let options =
            parse_options_with("w10", RenderOptions::original(), &DimensionLimits::default());
        let result = render_variant(&backend, source(&backend), &options).unwrap();
        assert_eq!((result.width(), result.height()), (1234, 567));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode(6)]);
    }

    // =========================================================================
    // Real pixels
    // =========================================================================

    #[test]
    fn canvas_fit_real_pixels() {
        let backend = RustBackend::new();
        let src = Canvas::blank(&backend, 1200, 800, Rgba::opaque(255, 0, 0)).unwrap();
        let result = render_variant(&backend, src, &parse("w600-h400-z1-c00ff00")).unwrap();

        assert_eq!((result.width(), result.height()), (600, 400));
        // Corner shows the canvas, centre shows the source.
        assert_eq!(backend.pixel(result.raster(), 5, 5), Rgba::opaque(0, 255, 0));
        let centre = backend.pixel(result.raster(), 300, 200);
        assert!(centre.r > 250 && centre.g < 5 && centre.a == 255, "{centre:?}");
    }

    #[test]
    fn encode_clamps_quality() {
        let backend = MockBackend::new();
        let canvas = Canvas::blank(&backend, 10, 10, Rgba::WHITE).unwrap();
        canvas.encode(&backend, ImageKind::Png, Some(72)).unwrap();
        assert!(backend.get_operations().contains(&RecordedOp::Encode {
            kind: ImageKind::Png,
            quality: Some(9),
            width: 10,
            height: 10
        }));
    }
}
