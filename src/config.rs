//! [`Client`](crate::client::Client) configuration.
//!
//! Defaults via [`Default`], a fluent chain of per-field setters on
//! [`ClientConfigBuilder`] each returning `Self`, and a final `build()`
//! that validates before producing the concrete config.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum number of requests dispatched in parallel.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Default queue-size threshold that triggers an emergency run.
pub const DEFAULT_EMERGENCY_RUN_THRESHOLD: usize = 10_000;
/// Default cap on retained custom-404 directory records.
pub const DEFAULT_CUSTOM_404_CACHE_SIZE: usize = 50;
/// Default relative-distance threshold for custom-404 signature matching.
pub const DEFAULT_CUSTOM_404_SIGNATURE_THRESHOLD: f64 = 0.1;
/// Default number of random tokens tried per probe generator.
pub const DEFAULT_CUSTOM_404_PROBE_PRECISION: usize = 2;

/// Configuration for a [`Client`](crate::client::Client).
///
/// Build via [`ClientConfig::builder`], or use [`ClientConfig::default`]
/// directly for the stock defaults: concurrency 20, timeout 60s, 404
/// cache size 50, signature threshold 0.1, probe precision 2.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub user_agent: String,
    pub default_headers: HashMap<String, String>,
    /// `From` header value — an "authorized by" contact for audited
    /// hosts to reach the operator of the scan.
    pub from_header: Option<String>,
    /// File the cookie jar is loaded from at startup and saved to by
    /// callers that opt into persistence; `None` means in-memory only.
    pub cookie_jar_path: Option<PathBuf>,
    pub default_cookies: HashMap<String, String>,
    pub max_concurrency: usize,
    pub default_timeout: Duration,
    pub emergency_run_threshold: usize,
    pub custom_404_cache_size: usize,
    pub custom_404_signature_threshold: f64,
    pub custom_404_probe_precision: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("probe-http-core/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: HashMap::new(),
            from_header: None,
            cookie_jar_path: None,
            default_cookies: HashMap::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            default_timeout: DEFAULT_TIMEOUT,
            emergency_run_threshold: DEFAULT_EMERGENCY_RUN_THRESHOLD,
            custom_404_cache_size: DEFAULT_CUSTOM_404_CACHE_SIZE,
            custom_404_signature_threshold: DEFAULT_CUSTOM_404_SIGNATURE_THRESHOLD,
            custom_404_probe_precision: DEFAULT_CUSTOM_404_PROBE_PRECISION,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    inner: ClientConfig,
}

impl ClientConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ClientConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self {
        self.map(|c| c.user_agent = ua.into())
    }

    pub fn default_header<S: Into<String>>(self, name: S, value: S) -> Self {
        self.map(|c| {
            c.default_headers.insert(name.into(), value.into());
        })
    }

    pub fn default_headers(self, headers: HashMap<String, String>) -> Self {
        self.map(|c| c.default_headers = headers)
    }

    pub fn from_header<S: Into<String>>(self, contact: S) -> Self {
        self.map(|c| c.from_header = Some(contact.into()))
    }

    pub fn cookie_jar_path<P: Into<PathBuf>>(self, path: P) -> Self {
        self.map(|c| c.cookie_jar_path = Some(path.into()))
    }

    pub fn default_cookies(self, cookies: HashMap<String, String>) -> Self {
        self.map(|c| c.default_cookies = cookies)
    }

    pub fn max_concurrency(self, n: usize) -> Self {
        self.map(|c| c.max_concurrency = n)
    }

    pub fn default_timeout(self, d: Duration) -> Self {
        self.map(|c| c.default_timeout = d)
    }

    pub fn emergency_run_threshold(self, n: usize) -> Self {
        self.map(|c| c.emergency_run_threshold = n)
    }

    pub fn custom_404_cache_size(self, n: usize) -> Self {
        self.map(|c| c.custom_404_cache_size = n)
    }

    pub fn custom_404_signature_threshold(self, t: f64) -> Self {
        self.map(|c| c.custom_404_signature_threshold = t)
    }

    pub fn custom_404_probe_precision(self, n: usize) -> Self {
        self.map(|c| c.custom_404_probe_precision = n)
    }

    pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

#[derive(Debug, Clone)]
pub enum ClientConfigError {
    ZeroConcurrency,
    ZeroTimeout,
    ZeroEmergencyThreshold,
    ZeroProbePrecision,
    InvalidThreshold(f64),
}

impl fmt::Display for ClientConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientConfigError::ZeroConcurrency => write!(f, "max_concurrency must be at least 1"),
            ClientConfigError::ZeroTimeout => write!(f, "default_timeout must be > 0"),
            ClientConfigError::ZeroEmergencyThreshold => {
                write!(f, "emergency_run_threshold must be at least 1")
            }
            ClientConfigError::ZeroProbePrecision => {
                write!(f, "custom_404_probe_precision must be at least 1")
            }
            ClientConfigError::InvalidThreshold(t) => {
                write!(f, "custom_404_signature_threshold must be in [0, 1] (got {t})")
            }
        }
    }
}

impl std::error::Error for ClientConfigError {}

fn validate(c: &ClientConfig) -> Result<(), ClientConfigError> {
    if c.max_concurrency == 0 {
        return Err(ClientConfigError::ZeroConcurrency);
    }
    if c.default_timeout.is_zero() {
        return Err(ClientConfigError::ZeroTimeout);
    }
    if c.emergency_run_threshold == 0 {
        return Err(ClientConfigError::ZeroEmergencyThreshold);
    }
    if c.custom_404_probe_precision == 0 {
        return Err(ClientConfigError::ZeroProbePrecision);
    }
    if !(0.0..=1.0).contains(&c.custom_404_signature_threshold) {
        return Err(ClientConfigError::InvalidThreshold(c.custom_404_signature_threshold));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.max_concurrency, 20);
        assert_eq!(cfg.default_timeout, Duration::from_secs(60));
        assert_eq!(cfg.custom_404_cache_size, 50);
        assert_eq!(cfg.custom_404_signature_threshold, 0.1);
        assert_eq!(cfg.custom_404_probe_precision, 2);
    }

    #[test]
    fn builder_rejects_zero_concurrency() {
        let err = ClientConfig::builder().max_concurrency(0).build().unwrap_err();
        assert!(matches!(err, ClientConfigError::ZeroConcurrency));
    }

    #[test]
    fn builder_overrides_chain() {
        let cfg = ClientConfig::builder()
            .user_agent("X/1")
            .max_concurrency(5)
            .default_header("Accept", "*/*")
            .build()
            .unwrap();
        assert_eq!(cfg.user_agent, "X/1");
        assert_eq!(cfg.max_concurrency, 5);
        assert_eq!(cfg.default_headers.get("Accept"), Some(&"*/*".to_string()));
    }
}
