//! # Pictor
//!
//! An on-demand image variant server. A URL names a stored source and a short
//! argument string (`w600-h400-z1-cffffff`); pictor resizes, crops or pads the
//! source to match, caches the result on disk, and answers with long-lived
//! cache headers. Missing or unreadable sources get a placeholder image
//! instead of an error, so a broken picture never breaks the page around it.
//!
//! # Request Flow
//!
//! ```text
//! URL ─► options ─► cache paths ─► 304? ─► cached? ─► render ─► cache ─► response
//!                                                      │ fails
//!                                                      ▼
//!                                                 placeholder
//! ```
//!
//! Every step before the render is a pure function of the request. Cache paths
//! are derived from the source path and a fingerprint of the options, so a
//! lookup is one existence check and concurrent writers of the same variant
//! produce the same bytes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`options`] | Argument-string parser: `RenderOptions`, crop policies, dimension limits, the options fingerprint |
//! | [`imaging`] | Geometry, compositing, crop-policy pipeline and placeholder drawing behind a raster backend trait |
//! | [`cache`] | Storage and cache directory layout, cache keys, atomic writes, invalidation |
//! | [`http`] | Request context, WebP negotiation, HTTP dates and response headers |
//! | [`service`] | The per-request state machine: not-modified, served, generated, placeholder |
//! | [`server`] | hyper listener and URL routing |
//! | [`config`] | `pictor.toml` loading, validation and the documented stock config |
//! | [`logging`] | `tracing-subscriber` setup |
//!
//! # Design Decisions
//!
//! ## Lenient Arguments
//!
//! The argument string comes from public URLs. Unknown tokens are ignored and
//! malformed values fall back to defaults; parsing cannot fail. Limits clamp
//! every requested dimension, so a URL cannot ask for an arbitrarily large
//! render.
//!
//! ## Enumerated Raster Capabilities
//!
//! The pipeline talks to pixels only through [`imaging::RasterBackend`]: decode,
//! encode, blank canvas, resample, region copy, flood fill, alpha blending,
//! truecolor conversion, pixel access and flip. The production backend is
//! pure Rust on the `image` crate; tests swap in a recording mock to check
//! the exact sequence of operations.
//!
//! ## No Lock, No Index
//!
//! The cache is the filesystem. Writes go to a temporary sibling and are
//! renamed into place, so a reader sees either nothing or a complete file.
//! Removing a source's cache directory is the whole invalidation story.

pub mod cache;
pub mod config;
pub mod http;
pub mod imaging;
pub mod logging;
pub mod options;
pub mod server;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;
