//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait is the complete list of pixel primitives the
//! rest of the crate uses: decode, encode, blank canvas, resample copy,
//! region copy, flood fill, alpha-blending toggle, truecolor conversion,
//! per-pixel get/set and flip. Geometry and compositing are built on top of
//! these in [`operations`](super::operations) and
//! [`compositor`](super::compositor); they never touch pixels directly.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::calculations::{Flip, Rect};
use super::format::ImageKind;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// An 8-bit RGBA color. `a == 255` is fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse a 6-digit hex color (`"fff0a0"`) into an opaque color.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::opaque(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// An owned decoded image plus its alpha-blending mode.
///
/// Exactly one pixel buffer per value. Operations that change geometry
/// produce a new `Raster` and drop the old one.
#[derive(Debug, Clone)]
pub struct Raster {
    image: DynamicImage,
    alpha_blending: bool,
}

impl Raster {
    pub(crate) fn from_image(image: DynamicImage) -> Self {
        Self {
            image,
            alpha_blending: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// True when the pixel buffer carries its own alpha channel.
    pub fn is_truecolor(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn alpha_blending(&self) -> bool {
        self.alpha_blending
    }

    pub(crate) fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut DynamicImage {
        &mut self.image
    }

    pub(crate) fn set_alpha_blending_flag(&mut self, on: bool) {
        self.alpha_blending = on;
    }
}

/// Pixel primitives every backend must provide.
///
/// See the [module docs](self) for the operation list.
pub trait RasterBackend: Send + Sync {
    /// Decode JPEG, PNG, GIF or WebP bytes.
    fn decode(&self, bytes: &[u8]) -> Result<Raster, BackendError>;

    /// Encode to `kind`. `quality` is already clamped to the format's range.
    fn encode(
        &self,
        raster: &Raster,
        kind: ImageKind,
        quality: Option<u32>,
    ) -> Result<Vec<u8>, BackendError>;

    /// A truecolor canvas filled with `fill`, alpha blending enabled.
    fn blank(&self, width: u32, height: u32, fill: Rgba) -> Result<Raster, BackendError>;

    /// Resample `src_rect` of `src` into `dst_rect` of `dst`.
    fn resample(
        &self,
        dst: &mut Raster,
        src: &Raster,
        dst_rect: Rect,
        src_rect: Rect,
    ) -> Result<(), BackendError>;

    /// Copy `src_rect` of `src` to `(x, y)` on `dst` without scaling.
    /// Blends over existing pixels when `dst` has alpha blending on,
    /// replaces them otherwise. Pixels falling outside `dst` are dropped.
    fn copy_region(&self, dst: &mut Raster, src: &Raster, x: i64, y: i64, src_rect: Rect);

    /// Flood-fill the 4-connected region of same-colored pixels at `(x, y)`.
    fn flood_fill(&self, raster: &mut Raster, x: u32, y: u32, color: Rgba);

    fn set_alpha_blending(&self, raster: &mut Raster, on: bool);

    /// Give the raster its own alpha channel if it lacks one.
    fn to_truecolor(&self, raster: &mut Raster);

    fn pixel(&self, raster: &Raster, x: u32, y: u32) -> Rgba;

    /// Write one pixel verbatim (no blending). Out-of-bounds writes are ignored.
    fn set_pixel(&self, raster: &mut Raster, x: u32, y: u32, color: Rgba);

    fn flip(&self, raster: &mut Raster, flip: Flip);
}
