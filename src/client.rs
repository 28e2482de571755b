//! The request orchestrator: configuration, the public request API,
//! burst scheduling, cookie/observer wiring, and the custom-404
//! integration.
//!
//! A `Client` is meant to be held behind an `Arc` and shared across
//! every caller that issues requests — probe dispatch for the
//! custom-404 detector needs its own handle back to the `Client` to
//! launch requests through the same queue and transport, which only
//! works cleanly if the `Client` itself is reference-counted rather
//! than borrowed.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::config::ClientConfig;
use crate::cookies::{load_jar, save_jar, Cookie, CookieJar, CookieSource};
use crate::custom404::{CustomFourZeroFourDetector, ProbeLauncher};
use crate::errors::ClientError;
use crate::observable::{EventArgs, Observable};
use crate::request::{next_request_id, Method, Request, RequestCallback, RequestOptions};
use crate::response::Response;
use crate::stats::Statistics;
use crate::transport::{ReqwestTransport, Transport};

const CHANNELS: &[&str] = &["after_each_run", "on_queue", "on_new_cookies", "on_complete"];

/// What [`Client::request`] (and its verb shims) hand back: a completed
/// [`Response`] for a blocking request, or the queued [`Request`]
/// handle otherwise.
#[derive(Clone)]
pub enum RequestOutcome {
    Dispatched(Arc<Request>),
    Completed(Response),
}

impl RequestOutcome {
    /// The response, if this outcome is already `Completed`.
    pub fn response(&self) -> Option<&Response> {
        match self {
            RequestOutcome::Completed(response) => Some(response),
            RequestOutcome::Dispatched(_) => None,
        }
    }
}

/// The process-wide HTTP orchestrator.
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    cookie_jar: Mutex<CookieJar>,
    stats: Statistics,
    custom404: Arc<CustomFourZeroFourDetector>,
    observable: Observable,
    /// `after_run` is deliberately not folded into `observable`: it is
    /// a take-and-clear snapshot at the top of every drain iteration in
    /// `run`, not a normal persistent subscriber list.
    after_run: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
    run_active: AtomicBool,
}

impl Client {
    /// Builds a `Client` backed by a real [`ReqwestTransport`].
    pub fn new(config: ClientConfig) -> Result<Arc<Self>, ClientError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config.max_concurrency)?);
        Self::with_transport(config, transport)
    }

    /// Builds a `Client` over a caller-supplied [`Transport`] — the
    /// integration seam tests use to swap in a scripted fake instead of
    /// real network calls.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Arc<Self>, ClientError> {
        let cookie_jar = match &config.cookie_jar_path {
            Some(path) => load_jar(path)?,
            None => CookieJar::new(),
        };
        let custom404 = Arc::new(CustomFourZeroFourDetector::new(
            config.custom_404_signature_threshold,
            config.custom_404_probe_precision,
        ));

        Ok(Arc::new(Self {
            config,
            transport,
            cookie_jar: Mutex::new(cookie_jar),
            stats: Statistics::new(),
            custom404,
            observable: Observable::new(CHANNELS),
            after_run: Mutex::new(Vec::new()),
            run_active: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Persists the cookie jar to `config.cookie_jar_path`, if one was
    /// configured. A no-op otherwise.
    pub fn save_cookie_jar(&self) -> Result<(), ClientError> {
        if let Some(path) = &self.config.cookie_jar_path {
            save_jar(&self.cookie_jar.lock().unwrap(), path)?;
        }
        Ok(())
    }

    // ---- request construction -------------------------------------------------

    /// Builds and dispatches a request.
    ///
    /// Cookie precedence: `jar.for_url(url)`, then `config.default_cookies`,
    /// then `options.cookies` — each later source overrides a same-name
    /// entry from an earlier one. Header precedence is the same shape:
    /// `config.default_headers` (plus `From`, if configured) overridden
    /// by `options.headers`.
    pub async fn request(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        if url.trim().is_empty() {
            return Err(ClientError::InvalidArgument("url must not be empty".to_string()));
        }
        let parsed = Url::parse(url)?;

        let mut cookies = if options.no_cookie_jar {
            HashMap::new()
        } else {
            self.cookie_jar.lock().unwrap().for_url(&parsed)
        };
        cookies.extend(self.config.default_cookies.clone());
        cookies.extend(std::mem::take(&mut options.cookies));

        let mut header_values: HashMap<String, String> = self.config.default_headers.clone();
        if let Some(from) = &self.config.from_header {
            header_values.entry("From".to_string()).or_insert_with(|| from.clone());
        }
        header_values.insert("User-Agent".to_string(), self.config.user_agent.clone());
        header_values.extend(std::mem::take(&mut options.headers));

        let mut headers = HeaderMap::new();
        for (name, value) in header_values {
            let name = HeaderName::from_str(&name)
                .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| ClientError::InvalidHeader(value.clone()))?;
            headers.insert(name, value);
        }

        let mut callbacks = Vec::new();
        if let Some(cb) = callback {
            callbacks.push(cb);
        }

        let request = Request {
            id: next_request_id(),
            method: options.method.unwrap_or(Method::Get),
            url: parsed,
            headers,
            body: options.body,
            cookies,
            follow_location: options.follow_location,
            high_priority: options.high_priority,
            blocking: options.blocking,
            update_cookies: options.update_cookies,
            timeout: options.timeout.unwrap_or(self.config.default_timeout),
            performer: options.performer,
            callbacks,
        };

        let _ = self
            .observable
            .dispatch("on_queue", &EventArgs::Request(Arc::new(request.clone())));

        Ok(self.forward_request(request).await)
    }

    pub async fn get(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        options.method = Some(Method::Get);
        self.request(url, options, callback).await
    }

    pub async fn post(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        options.method = Some(Method::Post);
        if matches!(options.body, crate::request::Body::Empty) && !options.parameters.is_empty() {
            options.body = crate::request::Body::Form(options.parameters.clone());
        }
        self.request(url, options, callback).await
    }

    pub async fn trace(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        options.method = Some(Method::Trace);
        self.request(url, options, callback).await
    }

    pub async fn head(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        options.method = Some(Method::Head);
        self.request(url, options, callback).await
    }

    pub async fn put(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        options.method = Some(Method::Put);
        if matches!(options.body, crate::request::Body::Empty) && !options.parameters.is_empty() {
            options.body = crate::request::Body::Form(options.parameters.clone());
        }
        self.request(url, options, callback).await
    }

    pub async fn delete(
        self: &Arc<Self>,
        url: &str,
        mut options: RequestOptions,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        options.method = Some(Method::Delete);
        self.request(url, options, callback).await
    }

    /// Sends `params` as cookies on an otherwise plain GET.
    pub async fn cookie(
        self: &Arc<Self>,
        url: &str,
        params: HashMap<String, String>,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        let options = RequestOptions {
            method: Some(Method::Get),
            cookies: params,
            ..Default::default()
        };
        self.request(url, options, callback).await
    }

    /// Sends `params` as headers on an otherwise plain GET.
    pub async fn header(
        self: &Arc<Self>,
        url: &str,
        params: HashMap<String, String>,
        callback: Option<RequestCallback>,
    ) -> Result<RequestOutcome, ClientError> {
        let options = RequestOptions {
            method: Some(Method::Get),
            headers: params,
            ..Default::default()
        };
        self.request(url, options, callback).await
    }

    /// Enqueues an already-built [`Request`] directly, skipping the
    /// option-merging `request` normally does.
    pub async fn queue(self: &Arc<Self>, request: Request) -> RequestOutcome {
        self.forward_request(request).await
    }

    // ---- dispatch machinery -----------------------------------------------------

    async fn forward_request(self: &Arc<Self>, mut request: Request) -> RequestOutcome {
        let blocking = request.blocking;
        let high_priority = request.high_priority;

        let completion_tx = if blocking {
            let (tx, rx) = tokio::sync::oneshot::channel::<Response>();
            request.callbacks.push(self.completion_callback(Some(Arc::new(Mutex::new(Some(tx))))));
            Some(rx)
        } else {
            request.callbacks.push(self.completion_callback(None));
            None
        };

        let request = Arc::new(request);
        self.stats.record_request();

        if high_priority || blocking {
            self.transport.queue_front(request.clone());
        } else {
            self.transport.queue_back(request.clone());
        }

        let queue_size = self.transport.queue_size();
        let should_emergency_run =
            queue_size >= self.config.emergency_run_threshold && !self.run_active.load(Ordering::SeqCst);

        if blocking {
            self.transport.run().await;
            let response = completion_tx
                .unwrap()
                .await
                .expect("a dispatched request's completion callback always fires exactly once");
            return RequestOutcome::Completed(response);
        }

        if should_emergency_run {
            let client = self.clone();
            tokio::spawn(async move { client.run().await });
        }

        RequestOutcome::Dispatched(request)
    }

    /// Builds the completion callback every dispatched request carries:
    /// records statistics, fires `on_complete`, and — for requests with
    /// `update_cookies` set — merges `Set-Cookie` headers into the jar
    /// and fires `on_new_cookies`. `blocking_tx`, if present, also
    /// delivers the response back to the awaiting `forward_request` call.
    fn completion_callback(
        self: &Arc<Self>,
        blocking_tx: Option<Arc<Mutex<Option<tokio::sync::oneshot::Sender<Response>>>>>,
    ) -> RequestCallback {
        let client = self.clone();
        Arc::new(move |response: &Response| {
            client.stats.record_response(response.round_trip_time, response.timed_out);
            let _ = client
                .observable
                .dispatch("on_complete", &EventArgs::Response(Arc::new(response.clone())));

            if response.request.update_cookies {
                client.parse_and_set_cookies(response);
            }

            if let Some(cell) = &blocking_tx {
                if let Some(tx) = cell.lock().unwrap().take() {
                    let _ = tx.send(response.clone());
                }
            }
        })
    }

    // ---- run / sandbox -----------------------------------------------------

    /// Drains the transport queue in a burst: repeatedly run the
    /// transport to idle, then fire and clear whatever `after_run`
    /// callbacks have accumulated, until both the queue and the
    /// `after_run` list are empty. Finishes by firing `after_each_run`
    /// (not cleared between bursts) and pruning the custom-404 cache.
    pub async fn run(self: &Arc<Self>) {
        self.run_active.store(true, Ordering::SeqCst);
        self.stats.begin_burst();

        loop {
            self.transport.run().await;

            let pending = std::mem::take(&mut *self.after_run.lock().unwrap());
            for callback in &pending {
                let callback = callback.clone();
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback()));
                if let Err(panic) = result {
                    log::warn!("after_run callback panicked: {}", panic_message(&panic));
                }
            }

            let queue_empty = self.transport.queue_size() == 0;
            let after_run_empty = self.after_run.lock().unwrap().is_empty();
            if queue_empty && after_run_empty {
                break;
            }
        }

        let _ = self.observable.dispatch("after_each_run", &EventArgs::None);
        self.custom404.prune(self.config.custom_404_cache_size);
        self.run_active.store(false, Ordering::SeqCst);
    }

    pub fn abort(&self) {
        self.transport.abort();
    }

    /// Resets jar, statistics, and (if `hooks_too`) every observer and
    /// `after_run` callback. Does not touch configuration.
    pub fn reset(&self, hooks_too: bool) {
        self.transport.abort();
        self.cookie_jar.lock().unwrap().clear();
        self.stats.reset_all();
        if hooks_too {
            self.observable.clear_observers();
            self.after_run.lock().unwrap().clear();
        }
    }

    /// Snapshots the cookie jar and every observer list, runs `block`,
    /// then restores the snapshot — cookies learned and observers
    /// registered inside `block` are invisible once `sandbox` returns.
    pub async fn sandbox<F, Fut, T>(self: &Arc<Self>, block: F) -> T
    where
        F: FnOnce(Arc<Client>) -> Fut,
        Fut: Future<Output = T>,
    {
        let saved_jar = self.cookie_jar.lock().unwrap().deep_clone();
        let saved_observable_lengths = self.observable.snapshot_lengths();
        let saved_after_run_len = self.after_run.lock().unwrap().len();

        let result = block(self.clone()).await;

        *self.cookie_jar.lock().unwrap() = saved_jar;
        self.observable.restore_lengths(&saved_observable_lengths);
        self.after_run.lock().unwrap().truncate(saved_after_run_len);

        result
    }

    // ---- cookies -----------------------------------------------------

    pub fn update_cookies<I: IntoIterator<Item = CookieSource>>(&self, cookies: I) -> Vec<Cookie> {
        self.cookie_jar.lock().unwrap().update(cookies)
    }

    /// Parses every `Set-Cookie` header on `response` and merges the
    /// result into the jar, firing `on_new_cookies` for whatever was
    /// actually installed.
    pub fn parse_and_set_cookies(&self, response: &Response) -> Vec<Cookie> {
        let installed = self
            .cookie_jar
            .lock()
            .unwrap()
            .update_from_response_headers(&response.url, &response.headers);
        if !installed.is_empty() {
            let _ = self.observable.dispatch(
                "on_new_cookies",
                &EventArgs::NewCookies(installed.clone(), Arc::new(response.clone())),
            );
        }
        installed
    }

    pub fn cookies(&self) -> Vec<Cookie> {
        self.cookie_jar.lock().unwrap().cookies()
    }

    // ---- statistics -----------------------------------------------------

    pub fn statistics(&self) -> HashMap<&'static str, f64> {
        self.stats.snapshot()
    }

    // ---- custom-404 -----------------------------------------------------

    /// Classifies `response.body` for `url`, fingerprinting `url`'s
    /// directory first if this is the first time it has been seen.
    pub async fn custom_404<F>(self: &Arc<Self>, url: &Url, response: &Response, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let launcher = self.probe_launcher();
        let is_404 = self.custom404.classify(url, response, &launcher).await;
        callback(is_404);
    }

    pub fn checked_for_custom_404(&self, url: &Url) -> bool {
        self.custom404.checked_for_custom_404(url)
    }

    pub fn needs_custom_404_check(&self, url: &Url) -> bool {
        self.custom404.needs_custom_404_check(url)
    }

    /// A [`ProbeLauncher`] that dispatches one blocking, high-priority,
    /// redirect-following GET through this same `Client` — so probe
    /// traffic shares the connection pool, concurrency cap, and
    /// statistics as any other request.
    ///
    /// A probe URL is always well-formed (it is built from an already-
    /// parsed `Url`), but `request()` can still fail with
    /// `InvalidHeader` if the *configured* default headers, user agent,
    /// or `From` contact are not valid header values — a configuration
    /// problem, not a programmer error per spec §7. Rather than unwind
    /// the whole detector over it, such a failure is reported as a
    /// synthetic transport-failure `Response` (`code == 0`), the same
    /// shape a real network failure takes, so the probe is simply
    /// counted as a non-404 and fingerprinting proceeds.
    fn probe_launcher(self: &Arc<Self>) -> ProbeLauncher {
        let client = self.clone();
        Arc::new(move |url: Url| -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let client = client.clone();
            Box::pin(async move {
                let options = RequestOptions {
                    method: Some(Method::Get),
                    follow_location: true,
                    high_priority: true,
                    blocking: true,
                    ..Default::default()
                };
                match client.request(url.as_str(), options, None).await {
                    Ok(RequestOutcome::Completed(response)) => response,
                    Ok(RequestOutcome::Dispatched(_)) => {
                        unreachable!("blocking requests always resolve to RequestOutcome::Completed")
                    }
                    Err(err) => synthetic_transport_failure(&url, err.to_string()),
                }
            })
        })
    }

    // ---- observer registration -----------------------------------------------------

    /// Registers an `after_run` callback: fires once at the end of the
    /// drain iteration during which it was registered, unlike the
    /// persistent observers below, and is removed from the list the
    /// moment it fires.
    pub fn after_run(&self, callback: impl Fn() + Send + Sync + 'static) -> &Self {
        self.after_run.lock().unwrap().push(Arc::new(callback));
        self
    }

    pub fn after_each_run(&self, callback: impl Fn() + Send + Sync + 'static) -> &Self {
        self.observable
            .subscribe("after_each_run", move |_| callback())
            .expect("after_each_run is declared at construction");
        self
    }

    pub fn on_queue(&self, callback: impl Fn(&Request) + Send + Sync + 'static) -> &Self {
        self.observable
            .subscribe("on_queue", move |args| {
                if let EventArgs::Request(request) = args {
                    callback(request);
                }
            })
            .expect("on_queue is declared at construction");
        self
    }

    pub fn on_new_cookies(&self, callback: impl Fn(&[Cookie], &Response) + Send + Sync + 'static) -> &Self {
        self.observable
            .subscribe("on_new_cookies", move |args| {
                if let EventArgs::NewCookies(cookies, response) = args {
                    callback(cookies, response);
                }
            })
            .expect("on_new_cookies is declared at construction");
        self
    }

    pub fn on_complete(&self, callback: impl Fn(&Response) + Send + Sync + 'static) -> &Self {
        self.observable
            .subscribe("on_complete", move |args| {
                if let EventArgs::Response(response) = args {
                    callback(response);
                }
            })
            .expect("on_complete is declared at construction");
        self
    }
}

/// Builds a `Response` reporting a transport-level failure (`code ==
/// 0`) for a request that never actually went out — used when building
/// the request itself fails for a reason that is not a programmer
/// error (spec §7), so the caller gets data instead of an unwind.
fn synthetic_transport_failure(url: &Url, message: String) -> Response {
    let request = Arc::new(Request {
        id: next_request_id(),
        method: Method::Get,
        url: url.clone(),
        headers: HeaderMap::new(),
        body: crate::request::Body::Empty,
        cookies: HashMap::new(),
        follow_location: true,
        high_priority: true,
        blocking: true,
        update_cookies: false,
        timeout: Duration::from_secs(0),
        performer: None,
        callbacks: Vec::new(),
    });
    Response {
        url: url.clone(),
        effective_url: url.clone(),
        code: 0,
        return_code: -1,
        return_message: message,
        headers: HeaderMap::new(),
        body: bytes::Bytes::new(),
        round_trip_time: Duration::from_millis(0),
        timed_out: false,
        request,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
