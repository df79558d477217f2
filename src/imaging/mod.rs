//! Image processing on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` (JPEG, PNG, GIF, WebP) |
//! | **Resample** | `resize_exact` with Lanczos3 |
//! | **Composite** | per-pixel source-over with a 7-bit opacity table |
//! | **Encode** | JPEG / PNG / GIF / lossless WebP encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for resize and cutout geometry (unit testable)
//! - **Format**: The four supported formats, MIME types and quality ranges
//! - **Backend**: [`RasterBackend`] trait + [`RustBackend`]
//! - **Compositor**: Opacity-aware placement of one raster onto another
//! - **Operations**: [`Canvas`] and the crop-policy pipeline
//! - **Placeholder**: The broken-image fallback

pub mod backend;
mod calculations;
pub mod compositor;
pub mod format;
pub mod operations;
pub mod placeholder;
pub mod rust_backend;

pub use backend::{BackendError, Raster, RasterBackend, Rgba};
pub use calculations::{
    Dimension, Flip, GeometryError, Rect, ResizeMode, cutout_rect, resize_target,
};
pub use format::ImageKind;
pub use operations::{Canvas, RenderError, render_variant};
pub use placeholder::{EMPTY_GIF, build_placeholder, load_icon, placeholder_size};
pub use rust_backend::RustBackend;
