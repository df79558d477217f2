//! HTTP transport.
//!
//! A hyper HTTP/1 listener in front of [`ImageService`]. URLs have the shape
//!
//! ```text
//! GET /{storage-type}/{module}/{id}/{args}/{filename}
//! GET /gallery/1/255/w600-h400-z1/photo.jpg
//! GET /thumbnail/1/255/_/photo.jpg          (no arguments)
//! ```
//!
//! `HEAD` is answered like `GET` without a body. Anything else is a plain
//! 404 or 405; image failures never surface here because the service always
//! produces an image.

use crate::http::{ImageResponse, RequestContext};
use crate::imaging::RasterBackend;
use crate::service::{ImageRequest, ImageService};
use chrono::Utc;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The path segments of an image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<'a> {
    pub storage_type: &'a str,
    pub module: &'a str,
    pub id: u64,
    /// Argument string; empty for `_`.
    pub args: &'a str,
    pub filename: &'a str,
}

/// Split an image URL path. `None` for any other shape.
pub fn parse_route(path: &str) -> Option<Route<'_>> {
    let mut segments = path.strip_prefix('/')?.split('/');
    let storage_type = segments.next()?;
    let module = segments.next()?;
    let id = segments.next()?.parse().ok()?;
    let args = segments.next()?;
    let filename = segments.next()?;
    if segments.next().is_some()
        || [storage_type, module, args, filename]
            .iter()
            .any(|s| s.is_empty())
    {
        return None;
    }
    Some(Route {
        storage_type,
        module,
        id,
        args: if args == "_" { "" } else { args },
        filename,
    })
}

fn plain(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(
        status.canonical_reason().unwrap_or_default(),
    )));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Convert a service response for the wire. `head` drops the body but keeps
/// every header.
pub fn into_http(image: ImageResponse, head: bool) -> Response<Full<Bytes>> {
    let body = if head { Bytes::new() } else { Bytes::from(image.body) };
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = image.status;
    *response.headers_mut() = image.headers;
    response
}

/// Route one request through the service.
pub async fn respond<B, T>(service: Arc<ImageService<B>>, req: Request<T>) -> Response<Full<Bytes>>
where
    B: RasterBackend + 'static,
{
    let head = match *req.method() {
        Method::GET => false,
        Method::HEAD => true,
        _ => {
            let mut response = plain(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }
    };

    let received_at = Utc::now();
    let (request, ctx) = {
        let Some(route) = parse_route(req.uri().path()) else {
            debug!(path = req.uri().path(), "no route");
            return plain(StatusCode::NOT_FOUND);
        };
        let request = ImageRequest::new(
            Some(route.storage_type),
            route.module,
            route.id,
            Some(route.filename),
            service.parse(route.args),
        );
        (request, RequestContext::from_headers(req.headers(), received_at))
    };
    drop(req);

    let worker = Arc::clone(&service);
    match tokio::task::spawn_blocking(move || worker.handle(&request, &ctx)).await {
        Ok((image, _)) => into_http(image, head),
        Err(e) => {
            error!(error = %e, "image worker failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Resolve on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve<B>(service: Arc<ImageService<B>>, addr: &str) -> Result<(), ServeError>
where
    B: RasterBackend + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(addr = %listener.local_addr()?, "listening");
    run(listener, service, shutdown_signal()).await
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Connections already accepted finish on their own tasks.
pub async fn run<B>(
    listener: TcpListener,
    service: Arc<ImageService<B>>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServeError>
where
    B: RasterBackend + 'static,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let handler = service_fn(move |req| {
                        let service = Arc::clone(&service);
                        async move { Ok::<_, Infallible>(respond(service, req).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), handler)
                        .await
                    {
                        debug!(peer = %peer, error = %e, "connection error");
                    }
                });
            }
            _ = &mut shutdown => break,
        }
    }
    info!("server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::test_helpers::*;
    use http::header::{CONNECTION, CONTENT_LENGTH};
    use http_body_util::BodyExt;

    fn service() -> (tempfile::TempDir, Arc<ImageService<RustBackend>>) {
        let (tmp, config) = storage_fixture();
        write_jpeg(&source_path(&config, "gallery", "1", 255, "photo.jpg"), 400, 300);
        (tmp, Arc::new(ImageService::new(RustBackend::new(), &config)))
    }

    fn get(method: Method, path: &str) -> Request<()> {
        Request::builder().method(method).uri(path).body(()).unwrap()
    }

    async fn body(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    // =========================================================================
    // Routing
    // =========================================================================

    #[test]
    fn parses_image_route() {
        assert_eq!(
            parse_route("/gallery/1/255/w600-h400/photo.jpg"),
            Some(Route {
                storage_type: "gallery",
                module: "1",
                id: 255,
                args: "w600-h400",
                filename: "photo.jpg",
            })
        );
    }

    #[test]
    fn underscore_means_no_args() {
        let route = parse_route("/thumbnail/1/7/_/a.png").unwrap();
        assert_eq!(route.args, "");
    }

    #[test]
    fn rejects_other_shapes() {
        assert_eq!(parse_route("/"), None);
        assert_eq!(parse_route("/gallery/1/255/photo.jpg"), None);
        assert_eq!(parse_route("/gallery/1/255/w1/photo.jpg/extra"), None);
        assert_eq!(parse_route("/gallery/1/abc/w1/photo.jpg"), None);
        assert_eq!(parse_route("/gallery/1/-5/w1/photo.jpg"), None);
        assert_eq!(parse_route("/gallery//255/w1/photo.jpg"), None);
        assert_eq!(parse_route("gallery/1/255/w1/photo.jpg"), None);
    }

    // =========================================================================
    // Responses
    // =========================================================================

    #[tokio::test]
    async fn get_serves_image() {
        let (_tmp, svc) = service();
        let response = respond(svc, get(Method::GET, "/gallery/1/255/w200/photo.jpg")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/jpeg");
        assert_eq!(response.headers()[CONNECTION], "close");
        assert_eq!(body_dimensions(&body(response).await), (200, 150));
    }

    #[tokio::test]
    async fn head_keeps_headers_drops_body() {
        let (_tmp, svc) = service();
        let response = respond(svc, get(Method::HEAD, "/gallery/1/255/w200/photo.jpg")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(CONTENT_LENGTH));
        assert!(body(response).await.is_empty());
    }

    #[tokio::test]
    async fn other_methods_not_allowed() {
        let (_tmp, svc) = service();
        let response = respond(svc, get(Method::POST, "/gallery/1/255/w200/photo.jpg")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn unknown_path_not_found() {
        let (_tmp, svc) = service();
        let response = respond(svc, get(Method::GET, "/favicon.ico")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_source_still_returns_image() {
        let (_tmp, svc) = service();
        let response = respond(svc, get(Method::GET, "/gallery/1/255/w80-h60/nope.jpg")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(body_dimensions(&body(response).await), (80, 60));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_tmp, svc) = service();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        run(listener, svc, async {}).await.unwrap();
    }
}
