//! Shared test utilities for the pictor test suite.
//!
//! Builds an isolated storage tree in a temp directory and writes synthetic
//! sources into it, so orchestrator tests run against real files without a
//! checked-in fixture directory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let (tmp, config) = storage_fixture();
//! let source = source_path(&config, "gallery", "1", 255, "photo.jpg");
//! write_jpeg(&source, 1200, 800);
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::cache::DirectoryContext;
use crate::config::ServiceConfig;
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// Fixture setup
// =========================================================================

/// A temp directory and a default config rooted in it.
pub fn storage_fixture() -> (TempDir, ServiceConfig) {
    let tmp = TempDir::new().unwrap();
    let mut config = ServiceConfig::default();
    config.storage.root = tmp.path().to_path_buf();
    (tmp, config)
}

/// Where the source for a request lives under `config`.
pub fn source_path(
    config: &ServiceConfig,
    storage_type: &str,
    module: &str,
    id: u64,
    filename: &str,
) -> PathBuf {
    directory(config, storage_type, module, id)
        .storage_root()
        .join(filename)
}

pub fn directory(
    config: &ServiceConfig,
    storage_type: &str,
    module: &str,
    id: u64,
) -> DirectoryContext {
    DirectoryContext::new(
        &config.storage.root,
        config.storage.level,
        Some(storage_type),
        module,
        id,
    )
}

// =========================================================================
// Synthetic sources
// =========================================================================

/// Write a solid mid-gray JPEG.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

/// Write a solid PNG of `color` (RGBA).
pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

/// Decoded dimensions of an encoded body.
pub fn body_dimensions(body: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(body).unwrap();
    (img.width(), img.height())
}
