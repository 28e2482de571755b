#![forbid(unsafe_code)]

//! # probe-http-core
//!
//! The HTTP orchestration core of a web-security scanner: a
//! process-wide, high-concurrency HTTP client that drives audit probes
//! while maintaining correctness-sensitive per-target state — a cookie
//! jar applied selectively to outbound requests, and a custom-404
//! ("soft 404") detector that fingerprints each directory's not-found
//! behavior.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use probe_http_core::{Client, ClientConfig, RequestOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::builder()
//!     .user_agent("probe/1.0")
//!     .max_concurrency(20)
//!     .build()?;
//! let client = Client::new(config)?;
//!
//! client.on_complete(|response| {
//!     log::debug!("{} -> {}", response.url, response.code);
//! });
//!
//! client.get("https://example.com/", RequestOptions::default(), None).await?;
//! client.run().await;
//!
//! println!("{:?}", client.statistics());
//! # Ok(()) }
//! ```
//!
//! ## Concepts
//! - [`Client`] — the orchestrator: configuration, the public request
//!   API, burst scheduling, statistics.
//! - [`CookieJar`] — per-`Client` cookie storage, applied to outbound
//!   requests and fed by response `Set-Cookie` headers.
//! - [`Signature`] — a similarity-threshold body fingerprint used by
//!   the custom-404 detector.
//! - [`Request`] / [`Response`] — one outbound call and its result.
//! - [`Transport`] — the pluggable transport contract `Client` drives
//!   requests through (shipped implementation: [`ReqwestTransport`]).
//!
//! ## Modules
//! - [`client`] — the orchestrator.
//! - [`config`] — [`ClientConfig`] and its builder.
//! - [`cookies`] — cookie parsing, the jar, and file persistence.
//! - [`custom404`] — the soft-404 fingerprint detector.
//! - [`signature`] — body fingerprinting.
//! - [`request`] / [`response`] — request/response value types.
//! - [`transport`] — the transport adapter contract.
//! - [`observable`] — the named multi-listener event channel.
//! - [`errors`] — the crate's error taxonomy.
//! - [`global`] — an optional process-wide default `Client` accessor.

mod client;
mod config;
mod cookies;
mod custom404;
mod errors;
mod global;
mod observable;
mod request;
mod response;
mod signature;
mod stats;
mod transport;

pub use client::{Client, RequestOutcome};
pub use global::{global, set_global};
pub use config::{ClientConfig, ClientConfigBuilder, ClientConfigError};
pub use cookies::{load_jar, save_jar, Cookie, CookieJar, CookieSource, SameSite};
pub use custom404::{directory_key, CustomFourZeroFourDetector};
pub use errors::{ClientError, ObservableError, TransportError};
pub use observable::{EventArgs, Observable};
pub use request::{Body, Method, Request, RequestCallback, RequestOptions};
pub use response::Response;
pub use signature::Signature;
pub use transport::{ReqwestTransport, Transport};

pub mod prelude {
    pub use crate::{Client, ClientConfig, ClientError, Request, RequestOptions, Response};
}
