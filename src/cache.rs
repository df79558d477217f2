//! Content-addressed variant cache on disk.
//!
//! Every rendered variant is written next to its siblings under a cache
//! directory that mirrors the storage directory of its source. Paths are pure
//! functions of the request, so a lookup is a single existence check and no
//! index or lock is needed.
//!
//! # Layout
//!
//! ```text
//! {root}/storage/{module}/{type}/{idpath}/{filename}.{ext}              source
//! {root}/storage/0/cache/{module}/{type}/{idpath}/{filename}-{key}.{ext}  variant
//! {root}/storage/0/cache/{module}/{type}/{idpath}/{filename}-{key}.webp   variant, WebP clients
//! {root}/storage/0/cache/0/{options_hash}.png|.webp                        placeholder
//! ```
//!
//! - **`type`**: the storage-type identifier after alias resolution
//!   (`thumbnail` → `1`, `gallery` → `2`, `editor` → `5`, absent → `0`).
//! - **`idpath`**: the numeric id in lowercase hex, left-padded with `0` to
//!   `level` digits and split into 2-character segments. Id 255 at level 4
//!   is `00/ff`.
//! - **`key`**: SHA-1 of `"{source_path}|{options_hash}"`, first 32 hex
//!   characters. Two sources with identical options never collide.
//!
//! Placeholders are keyed by the options hash alone, so every missing source
//! requested with the same options shares one file.
//!
//! ## Writes
//!
//! Files are written to a temporary sibling and renamed into place. Two
//! requests rendering the same variant race harmlessly: both produce the same
//! bytes and a reader never sees a partial file.
//!
//! ## Invalidation
//!
//! When a source disappears its whole cache directory is removed
//! ([`purge`]), so stale variants never outlive the original.

use crate::imaging::ImageKind;
use crate::options::RenderOptions;
use sha1::{Digest, Sha1};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Filename used when a request names none.
pub const DEFAULT_FILENAME: &str = "missing.png";

const STORAGE_DIR: &str = "storage";
const CACHE_DIR: &str = "storage/0/cache";
const PLACEHOLDER_DIR: &str = "storage/0/cache/0";

/// Resolve a storage-type identifier to its directory name.
pub fn storage_alias(storage_type: Option<&str>) -> String {
    match storage_type {
        Some("template") => "template".to_string(),
        Some("thumbnail") => "1".to_string(),
        Some("gallery") => "2".to_string(),
        Some("editor") => "5".to_string(),
        Some(other) => sanitize_segment(other),
        None => "0".to_string(),
    }
}

/// Hex id path: `255` at level 4 → `00/ff`.
pub fn id_path(id: u64, level: usize) -> String {
    let hex = format!("{:0>width$x}", id, width = level);
    hex.as_bytes()
        .chunks(2)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Keep a URL-supplied path segment inside its directory.
fn sanitize_segment(segment: &str) -> String {
    let clean: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    if clean.is_empty() {
        "0".to_string()
    } else {
        clean
    }
}

/// Final path component of a requested filename, or [`DEFAULT_FILENAME`].
fn sanitize_filename(filename: Option<&str>) -> String {
    filename
        .and_then(|f| {
            Path::new(f).components().next_back().and_then(|c| match c {
                Component::Normal(name) => name.to_str().map(str::to_string),
                _ => None,
            })
        })
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// Storage, cache and placeholder directories for one `(type, module, id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryContext {
    storage_root: PathBuf,
    cache_root: PathBuf,
    placeholder_root: PathBuf,
}

impl DirectoryContext {
    pub fn new(root: &Path, level: usize, storage_type: Option<&str>, module: &str, id: u64) -> Self {
        let tail = PathBuf::from(sanitize_segment(module))
            .join(storage_alias(storage_type))
            .join(id_path(id, level));
        Self {
            storage_root: root.join(STORAGE_DIR).join(&tail),
            cache_root: root.join(CACHE_DIR).join(&tail),
            placeholder_root: root.join(PLACEHOLDER_DIR),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn placeholder_root(&self) -> &Path {
        &self.placeholder_root
    }
}

/// Cache key for a source path and options hash.
///
/// SHA-1 of `"{source_path}|{options_hash}"`, truncated to 32 hex characters.
pub fn cache_key(source_path: &str, options_hash: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(source_path.as_bytes());
    hasher.update(b"|");
    hasher.update(options_hash.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(32);
    hex
}

/// Every path one request may read or write. Built once, read-only after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    source_path: PathBuf,
    source_kind: Option<ImageKind>,
    cache_key: String,
    cache_path: PathBuf,
    cache_webp_path: PathBuf,
    placeholder_png_path: PathBuf,
    placeholder_webp_path: PathBuf,
}

impl FileContext {
    pub fn new(dir: &DirectoryContext, filename: Option<&str>, options: &RenderOptions) -> Self {
        let filename = sanitize_filename(filename);
        let name = Path::new(&filename);
        let stem = name
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&filename)
            .to_string();
        let ext = name.extension().and_then(|e| e.to_str());

        let source_path = dir.storage_root().join(&filename);
        let options_hash = options.hash();
        let key = cache_key(&source_path.to_string_lossy(), &options_hash);

        let cache_name = match ext {
            Some(ext) => format!("{stem}-{key}.{ext}"),
            None => format!("{stem}-{key}"),
        };

        Self {
            source_kind: ext.and_then(ImageKind::from_extension),
            cache_path: dir.cache_root().join(cache_name),
            cache_webp_path: dir.cache_root().join(format!("{stem}-{key}.webp")),
            placeholder_png_path: dir.placeholder_root().join(format!("{options_hash}.png")),
            placeholder_webp_path: dir.placeholder_root().join(format!("{options_hash}.webp")),
            source_path,
            cache_key: key,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Format implied by the source extension, if it is one of ours.
    pub fn source_kind(&self) -> Option<ImageKind> {
        self.source_kind
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Variant path for the negotiated format.
    pub fn cache_path(&self, webp: bool) -> &Path {
        if webp {
            &self.cache_webp_path
        } else {
            &self.cache_path
        }
    }

    pub fn placeholder_png_path(&self) -> &Path {
        &self.placeholder_png_path
    }

    pub fn placeholder_webp_path(&self) -> &Path {
        &self.placeholder_webp_path
    }

    /// Placeholder path for the negotiated format.
    pub fn placeholder_path(&self, webp: bool) -> &Path {
        if webp {
            &self.placeholder_webp_path
        } else {
            &self.placeholder_png_path
        }
    }
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    debug!(path = %path.display(), bytes = bytes.len(), "cache write");
    Ok(())
}

/// Remove the cache directory of a context.
///
/// Returns whether anything was removed; a missing directory is not an error.
pub fn purge(dir: &DirectoryContext) -> io::Result<bool> {
    match std::fs::remove_dir_all(dir.cache_root()) {
        Ok(()) => {
            debug!(cache_root = %dir.cache_root().display(), "cache purged");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Modification time, or `None` if the file is missing or unreadable.
pub fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
