//! Request orchestration.
//!
//! [`ImageService::handle`] turns one request into one response. It never
//! fails: every path ends in an image body (or a 304), because a broken
//! image must not break the page that embeds it.
//!
//! ```text
//!            ┌────────────── source exists ──────────────┐
//! Start ─────┤                                           │
//!            │  cache fresh for If-Modified-Since ─► NotModified (304)
//!            │  cache file present ──────────────► Served
//!            │  otherwise decode/render/encode ──► Generated
//!            │        │ failure
//!            │        ▼
//!            └─ source missing ─► purge cache dir ─► Error path
//!
//! Error path:  e0 ─► Empty (1x1 GIF)
//!              cached placeholder ─► ErrorServed
//!              build + cache placeholder ─► ErrorServed
//!              anything fails ─► Fallback (1x1 GIF)
//! ```
//!
//! Format negotiation: a WebP-capable client is answered in WebP from the
//! `.webp` cache path; everyone else gets the source's own format.

use crate::cache::{self, DirectoryContext, FileContext};
use crate::config::ServiceConfig;
use crate::http::{HeaderPolicy, ImageResponse, RequestContext};
use crate::imaging::{
    Canvas, EMPTY_GIF, ImageKind, RasterBackend, RenderError, build_placeholder, load_icon,
    render_variant,
};
use crate::options::{DimensionLimits, RenderOptions, parse_options};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// One image request, already split out of its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub storage_type: Option<String>,
    pub module: String,
    pub id: u64,
    pub filename: Option<String>,
    pub options: RenderOptions,
}

impl ImageRequest {
    pub fn new(
        storage_type: Option<&str>,
        module: &str,
        id: u64,
        filename: Option<&str>,
        options: RenderOptions,
    ) -> Self {
        Self {
            storage_type: storage_type.map(str::to_string),
            module: module.to_string(),
            id,
            filename: filename.map(str::to_string),
            options,
        }
    }
}

/// Which terminal state a request reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 304; the client's copy is current.
    NotModified,
    /// Existing cache file sent.
    Served,
    /// Variant rendered, cached and sent.
    Generated,
    /// Placeholder sent in place of the variant.
    ErrorServed,
    /// `e0` request whose source failed; transparent pixel sent.
    Empty,
    /// The error path itself failed; transparent pixel sent.
    Fallback,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::NotModified => "not_modified",
            Outcome::Served => "served",
            Outcome::Generated => "generated",
            Outcome::ErrorServed => "error_served",
            Outcome::Empty => "empty",
            Outcome::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The image service: storage layout, limits, header policy and a raster
/// backend. Shared read-only across requests.
pub struct ImageService<B> {
    backend: B,
    root: PathBuf,
    level: usize,
    limits: DimensionLimits,
    policy: HeaderPolicy,
    icon: Option<PathBuf>,
    fallback_size: u32,
}

impl<B: RasterBackend> ImageService<B> {
    pub fn new(backend: B, config: &ServiceConfig) -> Self {
        Self {
            backend,
            root: config.storage.root.clone(),
            level: config.storage.level,
            limits: config.limits,
            policy: config.http.header_policy(),
            icon: config.placeholder.icon.clone(),
            fallback_size: config.placeholder.fallback_size,
        }
    }

    pub fn limits(&self) -> &DimensionLimits {
        &self.limits
    }

    /// Parse an argument string against this service's limits.
    pub fn parse(&self, args: &str) -> RenderOptions {
        parse_options(args, &self.limits)
    }

    pub fn directory(&self, storage_type: Option<&str>, module: &str, id: u64) -> DirectoryContext {
        DirectoryContext::new(&self.root, self.level, storage_type, module, id)
    }

    /// Remove every cached variant of one `(type, module, id)`.
    pub fn purge(&self, storage_type: Option<&str>, module: &str, id: u64) -> io::Result<bool> {
        cache::purge(&self.directory(storage_type, module, id))
    }

    /// Answer one request.
    pub fn handle(&self, request: &ImageRequest, ctx: &RequestContext) -> (ImageResponse, Outcome) {
        let started = Instant::now();
        let dir = self.directory(
            request.storage_type.as_deref(),
            &request.module,
            request.id,
        );
        let files = FileContext::new(&dir, request.filename.as_deref(), &request.options);

        let (response, outcome) = self.respond(&dir, &files, &request.options, ctx);

        info!(
            outcome = %outcome,
            cache_path = %files.cache_path(ctx.supports_webp()).display(),
            source = %files.source_path().display(),
            width = request.options.width(),
            height = request.options.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image request"
        );
        (response, outcome)
    }

    fn respond(
        &self,
        dir: &DirectoryContext,
        files: &FileContext,
        options: &RenderOptions,
        ctx: &RequestContext,
    ) -> (ImageResponse, Outcome) {
        let webp = ctx.supports_webp();

        if !files.source_path().is_file() {
            match cache::purge(dir) {
                Ok(true) => debug!(cache_root = %dir.cache_root().display(), "source gone, cache invalidated"),
                Ok(false) => {}
                Err(e) => warn!(cache_root = %dir.cache_root().display(), error = %e, "cache invalidation failed"),
            }
            return self.error_path(files, options, webp, ctx);
        }

        if let Some(mtime) = cache::modified(files.cache_path(webp)) {
            if ctx.is_fresh(mtime) {
                return (
                    ImageResponse::not_modified(&self.policy),
                    Outcome::NotModified,
                );
            }
            if let Some(response) = self.serve_cached(files, webp, ctx) {
                return (response, Outcome::Served);
            }
        }

        match self.generate(files, options, webp) {
            Ok((kind, body)) => (
                ImageResponse::image(kind, body, ctx, &self.policy),
                Outcome::Generated,
            ),
            Err(e) => {
                warn!(source = %files.source_path().display(), error = %e, "render failed, serving placeholder");
                let options = if options.is_missing_all_size() {
                    options
                        .with_width(Some(self.fallback_size))
                        .with_height(Some(self.fallback_size))
                } else {
                    options.clone()
                };
                self.error_path(files, &options, webp, ctx)
            }
        }
    }

    /// Read a cached variant. `None` sends the caller on to regeneration.
    fn serve_cached(
        &self,
        files: &FileContext,
        webp: bool,
        ctx: &RequestContext,
    ) -> Option<ImageResponse> {
        let path = files.cache_path(webp);
        let body = match std::fs::read(path) {
            Ok(body) => body,
            Err(e) => {
                debug!(cache_path = %path.display(), error = %e, "cache read failed");
                return None;
            }
        };
        let declared = if webp {
            Some(ImageKind::WebP)
        } else {
            files.source_kind()
        };
        let kind = ImageKind::sniff(&body).or(declared)?;
        Some(ImageResponse::image(kind, body, ctx, &self.policy))
    }

    fn generate(
        &self,
        files: &FileContext,
        options: &RenderOptions,
        webp: bool,
    ) -> Result<(ImageKind, Vec<u8>), RenderError> {
        let bytes = std::fs::read(files.source_path())?;
        let kind = if webp {
            ImageKind::WebP
        } else {
            ImageKind::sniff(&bytes)
                .or(files.source_kind())
                .ok_or_else(|| {
                    RenderError::UnsupportedFormat(files.source_path().display().to_string())
                })?
        };

        let source = Canvas::decode(&self.backend, &bytes)?;
        let variant = render_variant(&self.backend, source, options)?;
        let body = variant.encode(&self.backend, kind, Some(options.quality()))?;

        let path = files.cache_path(webp);
        cache::write_atomic(path, &body)?;
        debug!(cache_path = %path.display(), format = %kind, width = variant.width(), height = variant.height(), "variant cached");
        Ok((kind, body))
    }

    fn error_path(
        &self,
        files: &FileContext,
        options: &RenderOptions,
        webp: bool,
        ctx: &RequestContext,
    ) -> (ImageResponse, Outcome) {
        if !options.missing_placeholder() {
            return (self.empty(ctx), Outcome::Empty);
        }
        match self.placeholder(files, options, webp) {
            Ok((kind, body)) => (
                ImageResponse::image(kind, body, ctx, &self.policy),
                Outcome::ErrorServed,
            ),
            Err(e) => {
                error!(source = %files.source_path().display(), error = %e, "placeholder failed, serving empty image");
                (self.empty(ctx), Outcome::Fallback)
            }
        }
    }

    /// Reuse the cached placeholder for these options, or build and cache
    /// it. A WebP build also writes the PNG so later clients of either kind
    /// find one.
    fn placeholder(
        &self,
        files: &FileContext,
        options: &RenderOptions,
        webp: bool,
    ) -> Result<(ImageKind, Vec<u8>), RenderError> {
        let kind = if webp { ImageKind::WebP } else { ImageKind::Png };
        let path = files.placeholder_path(webp);
        if let Ok(body) = std::fs::read(path) {
            debug!(placeholder = %path.display(), "placeholder reused");
            return Ok((kind, body));
        }

        let icon = load_icon(&self.backend, self.icon.as_deref())?;
        let canvas = build_placeholder(&self.backend, options, icon, self.fallback_size)?;

        let png = canvas.encode(&self.backend, ImageKind::Png, Some(options.quality()))?;
        cache::write_atomic(files.placeholder_png_path(), &png)?;
        if !webp {
            return Ok((ImageKind::Png, png));
        }

        let body = canvas.encode(&self.backend, ImageKind::WebP, Some(options.quality()))?;
        cache::write_atomic(files.placeholder_webp_path(), &body)?;
        Ok((ImageKind::WebP, body))
    }

    fn empty(&self, ctx: &RequestContext) -> ImageResponse {
        ImageResponse::image(ImageKind::Gif, EMPTY_GIF.to_vec(), ctx, &self.policy)
    }
}
