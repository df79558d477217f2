//! HTTP surface of the service: request context in, response value out.
//!
//! Nothing here touches a socket. [`RequestContext`] carries the handful of
//! request facts the orchestrator consumes, and [`ImageResponse`] is the
//! complete answer (status, headers, body) that a transport writes out.
//!
//! ## Response headers
//!
//! | Header | 200 | 304 |
//! |---|---|---|
//! | `Content-Type` | negotiated format | - |
//! | `Content-Length` | body size | - |
//! | `Cache-Control` | `max-age=N, no-transform` | - |
//! | `Expires` | receive time + N | - |
//! | `Last-Modified` | receive time | - |
//! | `Accept-Ranges` | `none` | - |
//! | `Connection` | `close` | `close` |
//! | `X-Component` | component name | component name |

use crate::imaging::ImageKind;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use http::header::{
    ACCEPT, ACCEPT_RANGES, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES,
    HeaderMap, HeaderName, HeaderValue, IF_MODIFIED_SINCE, LAST_MODIFIED, USER_AGENT,
};
use http::StatusCode;
use std::time::SystemTime;

pub const X_COMPONENT: HeaderName = HeaderName::from_static("x-component");

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse any of the three HTTP date forms. Times at or before the epoch are
/// treated as unparseable.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let parsed = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // RFC 850 and asctime
            ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|naive| naive.and_utc())
        })?;
    (parsed.timestamp() > 0).then_some(parsed)
}

/// Does the client take WebP? Either it says so in `Accept`, or it is a
/// Chrome-family browser.
pub fn supports_webp(accept: Option<&str>, user_agent: Option<&str>) -> bool {
    accept.is_some_and(|a| a.contains("image/webp"))
        || user_agent.is_some_and(|ua| ua.contains(" Chrome/"))
}

/// Request facts the orchestrator consumes. Built once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    accept: Option<String>,
    user_agent: Option<String>,
    if_modified_since: Option<String>,
    received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(received_at: DateTime<Utc>) -> Self {
        Self {
            accept: None,
            user_agent: None,
            if_modified_since: None,
            received_at,
        }
    }

    /// Pull the consumed headers out of a header map.
    pub fn from_headers(headers: &HeaderMap, received_at: DateTime<Utc>) -> Self {
        let get = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            accept: get(ACCEPT),
            user_agent: get(USER_AGENT),
            if_modified_since: get(IF_MODIFIED_SINCE),
            received_at,
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn supports_webp(&self) -> bool {
        supports_webp(self.accept.as_deref(), self.user_agent.as_deref())
    }

    /// Whether `If-Modified-Since` was sent at all, parseable or not.
    pub fn has_if_modified_since(&self) -> bool {
        self.if_modified_since.is_some()
    }

    /// Parsed `If-Modified-Since`, if present and valid.
    pub fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        self.if_modified_since.as_deref().and_then(parse_http_date)
    }

    /// True when a file modified at `mtime` is no newer than the client's
    /// copy. Compared at whole-second precision, like the header itself.
    pub fn is_fresh(&self, mtime: SystemTime) -> bool {
        let Some(since) = self.if_modified_since() else {
            return false;
        };
        let mtime: DateTime<Utc> = mtime.into();
        mtime.timestamp() <= since.timestamp()
    }
}

/// Response header policy shared by all requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPolicy {
    /// `Cache-Control: max-age` and `Expires` window, seconds.
    pub cache_lifetime: u64,
    /// Value of the `X-Component` header.
    pub component: String,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            cache_lifetime: 31_536_000,
            component: "pictor".to_string(),
        }
    }
}

impl HeaderPolicy {
    fn component_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.component).ok()
    }
}

/// A complete response, ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Format of the body, when there is one.
    pub kind: Option<ImageKind>,
}

impl ImageResponse {
    /// 200 with an image body and the long-lived cache headers.
    pub fn image(
        kind: ImageKind,
        body: Vec<u8>,
        request: &RequestContext,
        policy: &HeaderPolicy,
    ) -> Self {
        let now = request.received_at();
        let expires = now
            + TimeDelta::try_seconds(policy.cache_lifetime as i64).unwrap_or(TimeDelta::zero());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(kind.mime()));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("none"));
        if let Some(component) = policy.component_value() {
            headers.insert(X_COMPONENT, component);
        }
        if let Ok(value) =
            HeaderValue::from_str(&format!("max-age={}, no-transform", policy.cache_lifetime))
        {
            headers.insert(CACHE_CONTROL, value);
        }
        if let Ok(value) = HeaderValue::from_str(&format_http_date(expires)) {
            headers.insert(EXPIRES, value);
        }
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        if let Ok(value) = HeaderValue::from_str(&format_http_date(now)) {
            headers.insert(LAST_MODIFIED, value);
        }

        Self {
            status: StatusCode::OK,
            headers,
            body,
            kind: Some(kind),
        }
    }

    /// 304 with no body and no `Content-Length`.
    pub fn not_modified(policy: &HeaderPolicy) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        if let Some(component) = policy.component_value() {
            headers.insert(X_COMPONENT, component);
        }
        Self {
            status: StatusCode::NOT_MODIFIED,
            headers,
            body: Vec::new(),
            kind: None,
        }
    }

    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
