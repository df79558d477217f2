//! Encode formats and their per-format quality rules.
//!
//! | Kind | Extension | MIME | Quality range | Default |
//! |---|---|---|---|---|
//! | JPEG | `jpg` / `jpeg` | `image/jpeg` | 0–100 | 85 |
//! | PNG | `png` | `image/png` | 0–9 (compression level) | 9 |
//! | GIF | `gif` | `image/gif` | none | none |
//! | WebP | `webp` | `image/webp` | 0–100 | 80 |
//!
//! Requested quality is clamped into the format's range at encode time, so a
//! single option value (`q72`) works for every format.

use image::ImageFormat;
use std::path::Path;

/// One of the four formats the service reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageKind {
    /// Match a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Detect the format from the leading bytes of encoded data.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Gif => Some(ImageKind::Gif),
            ImageFormat::WebP => Some(ImageKind::WebP),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::WebP => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::WebP => "image/webp",
        }
    }

    /// Quality used when the caller gives none. `None` for GIF.
    pub fn default_quality(self) -> Option<u32> {
        match self {
            ImageKind::Jpeg => Some(85),
            ImageKind::Png => Some(9),
            ImageKind::Gif => None,
            ImageKind::WebP => Some(80),
        }
    }

    /// Clamp a requested quality into this format's range.
    pub fn quality(self, requested: Option<u32>) -> Option<u32> {
        let max = match self {
            ImageKind::Jpeg | ImageKind::WebP => 100,
            ImageKind::Png => 9,
            ImageKind::Gif => return None,
        };
        Some(requested.map_or_else(|| self.default_quality().unwrap_or(max), |q| q.min(max)))
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(ImageKind::from_extension("JPG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("jpeg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("WebP"), Some(ImageKind::WebP));
        assert_eq!(ImageKind::from_extension("tiff"), None);
    }

    #[test]
    fn from_path_reads_extension() {
        assert_eq!(
            ImageKind::from_path(Path::new("/a/b/photo.PNG")),
            Some(ImageKind::Png)
        );
        assert_eq!(ImageKind::from_path(Path::new("/a/b/noext")), None);
    }

    #[test]
    fn quality_clamps_per_format() {
        assert_eq!(ImageKind::Jpeg.quality(Some(72)), Some(72));
        assert_eq!(ImageKind::Jpeg.quality(Some(150)), Some(100));
        assert_eq!(ImageKind::Png.quality(Some(72)), Some(9));
        assert_eq!(ImageKind::Png.quality(Some(3)), Some(3));
        assert_eq!(ImageKind::WebP.quality(Some(0)), Some(0));
        assert_eq!(ImageKind::Gif.quality(Some(50)), None);
    }

    #[test]
    fn quality_defaults() {
        assert_eq!(ImageKind::Jpeg.quality(None), Some(85));
        assert_eq!(ImageKind::Png.quality(None), Some(9));
        assert_eq!(ImageKind::WebP.quality(None), Some(80));
        assert_eq!(ImageKind::Gif.quality(None), None);
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(
            ImageKind::sniff(b"\x89PNG\r\n\x1a\n\0\0\0\0"),
            Some(ImageKind::Png)
        );
        assert_eq!(ImageKind::sniff(b"GIF89a\x01\x00"), Some(ImageKind::Gif));
        assert_eq!(ImageKind::sniff(b"\xff\xd8\xff\xe0"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"plain text"), None);
    }

    #[test]
    fn mime_types() {
        assert_eq!(ImageKind::Jpeg.mime(), "image/jpeg");
        assert_eq!(ImageKind::WebP.mime(), "image/webp");
    }
}
