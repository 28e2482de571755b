//! Response value type.
//!
//! A fully buffered HTTP response, carrying the pre-redirect URL,
//! round-trip timing, a transport-level return message distinct from
//! the HTTP status, and a non-owning back reference to the originating
//! request.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use url::Url;

use crate::request::Request;

/// A delivered response.
///
/// `code == 0` always means the transport did not receive an HTTP
/// status at all — either a hard transport failure (`timed_out ==
/// false`) or a timeout (`timed_out == true`). Exactly one `Response`
/// is produced per dispatched `Request`.
#[derive(Debug, Clone)]
pub struct Response {
    /// URL the request was sent to.
    pub url: Url,
    /// URL after following redirects, if any (equal to `url` otherwise).
    pub effective_url: Url,
    /// HTTP status code, or `0` if no status was received.
    pub code: u16,
    /// Transport-level return code (0 on success).
    pub return_code: i32,
    /// Transport-level return message ("" on success).
    pub return_message: String,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
    pub round_trip_time: Duration,
    pub timed_out: bool,
    /// Non-owning back-reference to the request that produced this
    /// response. `Arc` rather than `Weak` because the request itself
    /// holds no reference back to the response (no cycle to break) and
    /// callbacks need to read request metadata (performer, id) after
    /// the request has otherwise gone out of scope.
    pub request: Arc<Request>,
}

impl Response {
    /// True if the transport never received an HTTP status line.
    pub fn is_transport_failure(&self) -> bool {
        self.code == 0
    }

    pub fn performer(&self) -> Option<&str> {
        self.request.performer.as_deref()
    }
}
