//! Request value types.
//!
//! A minimal, frozen wrapper around one outbound HTTP call: method,
//! URL, headers, body, cookies, and the scheduling hints (priority,
//! blocking, timeout) the orchestrator needs before dispatch.
//!
//! Once a [`Request`] has been handed to [`crate::transport::Transport`]
//! its configuration is frozen — nothing downstream mutates method,
//! URL, headers, body, or cookies again. The `id`/`performer` pair is
//! assigned at enqueue time (see `crate::client`) and is what lets a
//! caller correlate a [`crate::response::Response`] back to its origin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use url::Url;

/// HTTP methods this crate can dispatch. TRACE is included because the
/// scanner uses it for cross-site-tracing probes; PATCH/CONNECT/OPTIONS
/// are not part of the audited surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Trace,
    Head,
    Put,
    Delete,
}

impl Method {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Trace => reqwest::Method::TRACE,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Trace => "TRACE",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// A request body. `Form` is kept distinct from `Raw` so verb shims
/// (`post`, `cookie`, `header`) can decide how to encode `parameters`
/// — its meaning depends on which verb is building the request.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Raw(Vec<u8>),
    Form(HashMap<String, String>),
}

/// A completion callback attached to a single request. Invoked, in
/// subscription order, once the transport delivers this request's
/// `Response` — before any `on_complete` observer fires.
pub type RequestCallback = Arc<dyn Fn(&crate::response::Response) + Send + Sync>;

/// The option bag accepted by [`crate::client::Client::request`] and
/// its verb shims.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: HashMap<String, String>,
    pub body: Body,
    /// Verb-dependent: cookie/form payload for `cookie()`/`post()`.
    pub parameters: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub no_cookie_jar: bool,
    pub follow_location: bool,
    pub high_priority: bool,
    pub blocking: bool,
    pub update_cookies: bool,
    pub timeout: Option<Duration>,
    pub performer: Option<String>,
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .field("cookies", &self.cookies)
            .field("no_cookie_jar", &self.no_cookie_jar)
            .field("follow_location", &self.follow_location)
            .field("high_priority", &self.high_priority)
            .field("blocking", &self.blocking)
            .field("update_cookies", &self.update_cookies)
            .field("timeout", &self.timeout)
            .field("performer", &self.performer)
            .finish()
    }
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh, process-wide monotonic request id.
///
/// Ids only need to be monotonic *within* one `Client`; a single
/// process-wide counter trivially satisfies that and avoids each
/// `Client` needing its own `AtomicU64`.
pub(crate) fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// A fully assembled, frozen request.
///
/// Built by [`crate::client::Client::request`] (and its verb shims);
/// never constructed directly by callers outside this crate.
#[derive(Clone)]
pub struct Request {
    pub id: u64,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
    pub cookies: HashMap<String, String>,
    pub follow_location: bool,
    pub high_priority: bool,
    pub blocking: bool,
    pub update_cookies: bool,
    pub timeout: Duration,
    pub performer: Option<String>,
    pub callbacks: Vec<RequestCallback>,
}

impl Request {
    pub fn has_high_priority(&self) -> bool {
        self.high_priority
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("follow_location", &self.follow_location)
            .field("high_priority", &self.high_priority)
            .field("blocking", &self.blocking)
            .field("update_cookies", &self.update_cookies)
            .field("timeout", &self.timeout)
            .field("performer", &self.performer)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
