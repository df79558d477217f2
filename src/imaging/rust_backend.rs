//! Pure Rust raster backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::load_from_memory` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder::new_with_quality`, level 0–9 mapped to `CompressionType` |
//! | Encode → GIF | `GifEncoder`, single frame |
//! | Encode → WebP | `WebPEncoder::new_lossless` (the pure Rust encoder is lossless only) |
//! | Resample | `imageops::resize` with `Lanczos3` |
//! | Copy / blend | per-pixel source-over compositing |
//! | Flip | `DynamicImage::fliph` / `flipv` |

use super::backend::{BackendError, Raster, RasterBackend, Rgba};
use super::calculations::{Flip, Rect};
use super::format::ImageKind;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, Frame, GenericImageView, ImageEncoder, RgbaImage};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn to_pixel(color: Rgba) -> image::Rgba<u8> {
    image::Rgba([color.r, color.g, color.b, color.a])
}

fn from_pixel(pixel: image::Rgba<u8>) -> Rgba {
    let [r, g, b, a] = pixel.0;
    Rgba::new(r, g, b, a)
}

/// Mutable RGBA view of a raster, converting the buffer first if needed.
fn rgba_mut(raster: &mut Raster) -> &mut RgbaImage {
    let image = raster.image_mut();
    if !matches!(image, DynamicImage::ImageRgba8(_)) {
        *image = DynamicImage::ImageRgba8(image.to_rgba8());
    }
    match image {
        DynamicImage::ImageRgba8(buf) => buf,
        _ => unreachable!("buffer converted to RGBA8 above"),
    }
}

/// Source-over compositing of `src` onto `dst`, straight alpha.
fn blend_over(dst: image::Rgba<u8>, src: image::Rgba<u8>) -> image::Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    if sa <= 0.0 {
        return dst;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let channel = |i: usize| {
        let s = src.0[i] as f32;
        let d = dst.0[i] as f32;
        ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8
    };
    image::Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Write `src` pixels onto `dst` at `(x, y)`, clipping to `dst`.
fn paste(dst: &mut Raster, src: &DynamicImage, x: i64, y: i64) {
    let blending = dst.alpha_blending();
    let buf = rgba_mut(dst);
    let (dst_w, dst_h) = (buf.width() as i64, buf.height() as i64);

    for (sx, sy, pixel) in src.pixels() {
        let dx = x + sx as i64;
        let dy = y + sy as i64;
        if dx < 0 || dy < 0 || dx >= dst_w || dy >= dst_h {
            continue;
        }
        let (dx, dy) = (dx as u32, dy as u32);
        let out = if blending {
            blend_over(*buf.get_pixel(dx, dy), pixel)
        } else {
            pixel
        };
        buf.put_pixel(dx, dy, out);
    }
}

/// Clip `rect` to the raster and return the sub-image it covers.
fn region(raster: &Raster, rect: Rect) -> DynamicImage {
    let (w, h) = raster.dimensions();
    let x = rect.x.min(w);
    let y = rect.y.min(h);
    let width = rect.width.min(w - x);
    let height = rect.height.min(h - y);
    raster.image().crop_imm(x, y, width, height)
}

fn encode_err(e: image::ImageError) -> BackendError {
    BackendError::EncodeFailed(e.to_string())
}

fn png_compression(level: u32) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

impl RasterBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, BackendError> {
        if ImageKind::sniff(bytes).is_none() {
            return Err(BackendError::DecodeFailed(
                "Unknown type of image".to_string(),
            ));
        }
        image::load_from_memory(bytes)
            .map(Raster::from_image)
            .map_err(|e| BackendError::DecodeFailed(e.to_string()))
    }

    fn encode(
        &self,
        raster: &Raster,
        kind: ImageKind,
        quality: Option<u32>,
    ) -> Result<Vec<u8>, BackendError> {
        let (width, height) = raster.dimensions();
        let mut buf = Vec::new();

        match kind {
            ImageKind::Jpeg => {
                let rgb = raster.image().to_rgb8();
                let q = quality.unwrap_or(85).clamp(1, 100) as u8;
                JpegEncoder::new_with_quality(&mut buf, q)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(encode_err)?;
            }
            ImageKind::Png => {
                let rgba = raster.image().to_rgba8();
                let compression = png_compression(quality.unwrap_or(9));
                PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive)
                    .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
            ImageKind::Gif => {
                let rgba = raster.image().to_rgba8();
                let mut encoder = GifEncoder::new(&mut buf);
                encoder
                    .encode_frame(Frame::new(rgba))
                    .map_err(encode_err)?;
            }
            ImageKind::WebP => {
                let rgba = raster.image().to_rgba8();
                WebPEncoder::new_lossless(&mut buf)
                    .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
        }

        Ok(buf)
    }

    fn blank(&self, width: u32, height: u32, fill: Rgba) -> Result<Raster, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Image width and height must be greater than zero ({width}x{height})"
            )));
        }
        let buf = RgbaImage::from_pixel(width, height, to_pixel(fill));
        Ok(Raster::from_image(DynamicImage::ImageRgba8(buf)))
    }

    fn resample(
        &self,
        dst: &mut Raster,
        src: &Raster,
        dst_rect: Rect,
        src_rect: Rect,
    ) -> Result<(), BackendError> {
        if dst_rect.width == 0 || dst_rect.height == 0 {
            return Err(BackendError::ProcessingFailed(
                "Resample target is empty".to_string(),
            ));
        }
        let scaled = region(src, src_rect).resize_exact(
            dst_rect.width,
            dst_rect.height,
            FilterType::Lanczos3,
        );
        paste(dst, &scaled, dst_rect.x as i64, dst_rect.y as i64);
        Ok(())
    }

    fn copy_region(&self, dst: &mut Raster, src: &Raster, x: i64, y: i64, src_rect: Rect) {
        let part = region(src, src_rect);
        paste(dst, &part, x, y);
    }

    fn flood_fill(&self, raster: &mut Raster, x: u32, y: u32, color: Rgba) {
        let buf = rgba_mut(raster);
        if x >= buf.width() || y >= buf.height() {
            return;
        }
        let target = *buf.get_pixel(x, y);
        let fill = to_pixel(color);
        if target == fill {
            return;
        }

        let mut stack = vec![(x, y)];
        while let Some((px, py)) = stack.pop() {
            if *buf.get_pixel(px, py) != target {
                continue;
            }
            buf.put_pixel(px, py, fill);
            if px > 0 {
                stack.push((px - 1, py));
            }
            if py > 0 {
                stack.push((px, py - 1));
            }
            if px + 1 < buf.width() {
                stack.push((px + 1, py));
            }
            if py + 1 < buf.height() {
                stack.push((px, py + 1));
            }
        }
    }

    fn set_alpha_blending(&self, raster: &mut Raster, on: bool) {
        raster.set_alpha_blending_flag(on);
    }

    fn to_truecolor(&self, raster: &mut Raster) {
        if !raster.is_truecolor() {
            rgba_mut(raster);
        }
    }

    fn pixel(&self, raster: &Raster, x: u32, y: u32) -> Rgba {
        if x >= raster.width() || y >= raster.height() {
            return Rgba::TRANSPARENT;
        }
        from_pixel(raster.image().get_pixel(x, y))
    }

    fn set_pixel(&self, raster: &mut Raster, x: u32, y: u32, color: Rgba) {
        let buf = rgba_mut(raster);
        if x < buf.width() && y < buf.height() {
            buf.put_pixel(x, y, to_pixel(color));
        }
    }

    fn flip(&self, raster: &mut Raster, flip: Flip) {
        let image = raster.image_mut();
        *image = match flip {
            Flip::Horizontal => image.fliph(),
            Flip::Vertical => image.flipv(),
            Flip::Both => image.fliph().flipv(),
        };
    }
}
