//! End-to-end scenarios through the public library API.
//!
//! Each test builds a storage tree in a temp directory, writes a synthetic
//! source, and drives `ImageService::handle` the way the HTTP server does.

use chrono::{TimeDelta, Utc};
use http::StatusCode;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
use pictor::cache::{DirectoryContext, FileContext};
use pictor::config::ServiceConfig;
use pictor::http::{RequestContext, format_http_date};
use pictor::imaging::RustBackend;
use pictor::service::{ImageRequest, ImageService, Outcome};
use std::path::Path;
use tempfile::TempDir;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

struct Fixture {
    _tmp: TempDir,
    config: ServiceConfig,
    service: ImageService<RustBackend>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.root = tmp.path().to_path_buf();
        let service = ImageService::new(RustBackend::new(), &config);
        Self {
            _tmp: tmp,
            config,
            service,
        }
    }

    fn dir(&self) -> DirectoryContext {
        DirectoryContext::new(
            &self.config.storage.root,
            self.config.storage.level,
            Some("gallery"),
            "1",
            255,
        )
    }

    fn write_source(&self, filename: &str, image: RgbaImage) {
        let path = self.dir().storage_root().join(filename);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image.save_with_format(&path, ImageFormat::Png).unwrap();
    }

    fn request(&self, args: &str, filename: &str) -> ImageRequest {
        ImageRequest::new(
            Some("gallery"),
            "1",
            255,
            Some(filename),
            self.service.parse(args),
        )
    }

    fn files(&self, request: &ImageRequest) -> FileContext {
        FileContext::new(&self.dir(), request.filename.as_deref(), &request.options)
    }
}

fn ctx() -> RequestContext {
    RequestContext::new(Utc::now())
}

fn decode(body: &[u8]) -> image::DynamicImage {
    image::load_from_memory(body).unwrap()
}

fn close_to(pixel: Rgba<u8>, expected: [u8; 4]) -> bool {
    pixel
        .0
        .iter()
        .zip(expected)
        .all(|(a, b)| (*a as i32 - b as i32).abs() <= 8)
}

#[test]
fn canvas_fit_centres_scaled_source_on_white() {
    let fx = Fixture::new();
    fx.write_source("photo.png", RgbaImage::from_pixel(1200, 800, Rgba(RED)));
    let req = fx.request("w600-h400-z1-cffffff", "photo.png");

    let (response, outcome) = fx.service.handle(&req, &ctx());
    assert_eq!(outcome, Outcome::Generated);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header(CONTENT_TYPE), Some("image/png"));
    assert_eq!(
        response.header(CACHE_CONTROL),
        Some("max-age=31536000, no-transform")
    );

    let img = decode(&response.body);
    assert_eq!(img.dimensions(), (600, 400));
    // 450x300 source centred at (75, 50); the margins are canvas.
    assert!(close_to(img.get_pixel(10, 10), [255, 255, 255, 255]));
    assert!(close_to(img.get_pixel(590, 390), [255, 255, 255, 255]));
    assert!(close_to(img.get_pixel(300, 200), RED));
}

#[test]
fn exact_fill_covers_then_centre_crops() {
    let fx = Fixture::new();
    let mut source = RgbaImage::from_pixel(100, 200, Rgba(RED));
    for y in 100..200 {
        for x in 0..100 {
            source.put_pixel(x, y, Rgba(BLUE));
        }
    }
    fx.write_source("tall.png", source);
    let req = fx.request("z2-w300-h300", "tall.png");

    let (response, outcome) = fx.service.handle(&req, &ctx());
    assert_eq!(outcome, Outcome::Generated);

    // Filled to 300x600, rows 150..450 kept: red above 150, blue below.
    let img = decode(&response.body);
    assert_eq!(img.dimensions(), (300, 300));
    assert!(close_to(img.get_pixel(150, 20), RED));
    assert!(close_to(img.get_pixel(150, 280), BLUE));
}

#[test]
fn missing_source_gets_placeholder_and_stale_cache_is_removed() {
    let fx = Fixture::new();
    let req = fx.request("w200-h200", "gone.jpg");

    let stale = fx.dir().cache_root().join("gone-0123.jpg");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, b"stale").unwrap();

    let (response, outcome) = fx.service.handle(&req, &ctx());
    assert_eq!(outcome, Outcome::ErrorServed);
    assert_eq!(response.status, StatusCode::OK);

    let img = decode(&response.body);
    assert_eq!(img.dimensions(), (200, 200));
    assert!(close_to(img.get_pixel(0, 0), [255, 255, 255, 255]));
    assert!(!fx.dir().cache_root().exists());
}

#[test]
fn second_placeholder_request_is_byte_identical() {
    let fx = Fixture::new();
    let req = fx.request("w200-h200", "gone.jpg");

    let (first, _) = fx.service.handle(&req, &ctx());
    let placeholder = fx.files(&req).placeholder_png_path().to_path_buf();
    assert!(placeholder.is_file());
    let written = modified(&placeholder);

    let (second, outcome) = fx.service.handle(&req, &ctx());
    assert_eq!(outcome, Outcome::ErrorServed);
    assert_eq!(second.body, first.body);
    assert_eq!(modified(&placeholder), written);
}

#[test]
fn if_modified_since_after_cache_write_is_304() {
    let fx = Fixture::new();
    fx.write_source("photo.png", RgbaImage::from_pixel(400, 300, Rgba(BLUE)));
    let req = fx.request("w200", "photo.png");

    let (generated, _) = fx.service.handle(&req, &ctx());
    assert!(generated.header(LAST_MODIFIED).is_some());

    let since = format_http_date(Utc::now() + TimeDelta::seconds(5));
    let (response, outcome) = fx
        .service
        .handle(&req, &ctx().with_if_modified_since(since));
    assert_eq!(outcome, Outcome::NotModified);
    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    assert!(response.body.is_empty());
    assert_eq!(response.header(CONTENT_LENGTH), None);
}

fn modified(path: &Path) -> std::time::SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}
