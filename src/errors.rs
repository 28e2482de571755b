//! Error taxonomy for the orchestration core.
//!
//! Only programmer errors propagate synchronously to callers of the
//! public API (bad URLs, unknown event names, subscribing without a
//! callback). Transport failures and timeouts are never exceptions —
//! they arrive as ordinary [`crate::response::Response`] values with
//! `code == 0`. Cookie-parse and observer-callback faults are isolated
//! and logged; see [`crate::observable`] and [`crate::cookies`].

use thiserror::Error;

/// Errors raised directly by the public [`crate::client::Client`] API.
///
/// These are the only error conditions that propagate synchronously —
/// every other fault (transport failure, timeout, cookie parse error,
/// observer callback panic) is isolated and surfaces as data instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The caller passed an empty or otherwise unusable URL.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The URL could not be parsed at all.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header name or value supplied by the caller was rejected.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Propagated from the [`crate::observable`] subsystem.
    #[error(transparent)]
    Observable(#[from] ObservableError),

    /// The configured cookie-jar file could not be read or written.
    #[error("cookie jar persistence failed: {0}")]
    CookieJarIo(String),

    /// The transport could not be constructed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by the [`crate::observable::Observable`] event channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservableError {
    /// A subscribe or dispatch call named an event that was never
    /// declared at construction time.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// A subscribe call was made without a callback.
    #[error("subscribe requires a callback")]
    NoCallback,
}

/// Errors from the [`crate::transport`] contract.
///
/// A failed or timed-out *request* is never an error here — it is
/// reported as a `Response` with `code == 0`. This type instead covers
/// failures of the transport *itself* (e.g. it could not be
/// constructed).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to construct transport: {0}")]
    Init(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}
