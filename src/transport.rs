//! The transport adapter contract, its `reqwest`-backed implementation,
//! and a test double.
//!
//! The queue/worker loop fills a bounded number of in-flight tasks from
//! a priority (front/tail) queue, awaits the next completion via a
//! `FuturesUnordered`, and refills — shared by [`crate::client::Client`]
//! and the custom-404 detector. `Transport` is an `async_trait` object
//! so either can be driven through the same interface regardless of
//! what sends the actual bytes over the wire.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::request::{Body, Request};
use crate::response::Response;

/// A minimal interface over a multi-request transport.
///
/// Implementations own connection reuse, transport-level timeouts, and
/// redirect following. A failed or timed-out request is never an
/// error at this boundary — it is reported as a [`Response`] with
/// `code == 0`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueues at the tail (dispatched after everything already queued).
    fn queue_back(&self, request: Arc<Request>);
    /// Enqueues at the head (dispatched before anything already queued).
    fn queue_front(&self, request: Arc<Request>);
    /// Drains the queue, dispatching up to `max_concurrency` requests in
    /// parallel and invoking each request's completion callbacks as
    /// responses arrive. Returns once the queue is empty.
    async fn run(&self);
    /// Best-effort cancellation of outstanding requests.
    fn abort(&self);
    fn set_max_concurrency(&self, n: usize);
    fn get_max_concurrency(&self) -> usize;
    /// Number of requests currently queued (not yet dispatched).
    fn queue_size(&self) -> usize;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    /// Follows redirects (used for requests with `follow_location == true`).
    http: reqwest::Client,
    /// Otherwise identical client with redirects disabled — `reqwest`'s
    /// redirect policy is fixed per `Client`, not per request, so a
    /// request with `follow_location == false` is sent through this one
    /// instead of the connection-pool-sharing `http` above.
    http_no_redirect: reqwest::Client,
    queue: StdMutex<VecDeque<Arc<Request>>>,
    semaphore: StdMutex<Arc<Semaphore>>,
    max_concurrency: AtomicUsize,
    /// Cancels an in-flight `run()`, including a worker parked waiting
    /// on `semaphore.acquire_owned()` — the same per-scope cancellation
    /// pattern the teacher uses for tab-level request cancellation
    /// (`engine::tab::Tab::cancel`), one level up at the transport.
    cancel: StdMutex<CancellationToken>,
}

impl ReqwestTransport {
    pub fn new(max_concurrency: usize) -> Result<Self, crate::errors::TransportError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| crate::errors::TransportError::Init(e.to_string()))?;
        let http_no_redirect = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| crate::errors::TransportError::Init(e.to_string()))?;
        Ok(Self {
            http,
            http_no_redirect,
            queue: StdMutex::new(VecDeque::new()),
            semaphore: StdMutex::new(Arc::new(Semaphore::new(max_concurrency))),
            max_concurrency: AtomicUsize::new(max_concurrency),
            cancel: StdMutex::new(CancellationToken::new()),
        })
    }

    async fn dispatch_one(http: reqwest::Client, request: Arc<Request>) -> Response {
        let started = Instant::now();
        let mut builder = http
            .request(request.method.as_reqwest(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(request.timeout);

        if !request.cookies.is_empty() {
            let cookie_header = request
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(http::header::COOKIE, cookie_header);
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Raw(bytes) => builder.body(bytes.clone()),
            Body::Form(fields) => builder.form(fields),
        };

        match builder.send().await {
            Ok(res) => {
                let effective_url = res.url().clone();
                let code = res.status().as_u16();
                let headers = res.headers().clone();
                let body = res.bytes().await.unwrap_or_default();
                Response {
                    url: request.url.clone(),
                    effective_url,
                    code,
                    return_code: 0,
                    return_message: String::new(),
                    headers,
                    body,
                    round_trip_time: started.elapsed(),
                    timed_out: false,
                    request: request.clone(),
                }
            }
            Err(err) => {
                let timed_out = err.is_timeout();
                Response {
                    url: request.url.clone(),
                    effective_url: request.url.clone(),
                    code: 0,
                    return_code: -1,
                    return_message: err.to_string(),
                    headers: http::HeaderMap::new(),
                    body: bytes::Bytes::new(),
                    round_trip_time: started.elapsed(),
                    timed_out,
                    request: request.clone(),
                }
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn queue_back(&self, request: Arc<Request>) {
        self.queue.lock().unwrap().push_back(request);
    }

    fn queue_front(&self, request: Arc<Request>) {
        self.queue.lock().unwrap().push_front(request);
    }

    async fn run(&self) {
        let cancel = {
            let mut slot = self.cancel.lock().unwrap();
            if slot.is_cancelled() {
                *slot = CancellationToken::new();
            }
            slot.clone()
        };
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.get_max_concurrency() {
                if cancel.is_cancelled() {
                    break;
                }
                let next = self.queue.lock().unwrap().pop_front();
                let Some(request) = next else { break };

                let semaphore = self.semaphore.lock().unwrap().clone();
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                    _ = cancel.cancelled() => break,
                };
                let http = if request.follow_location {
                    self.http.clone()
                } else {
                    self.http_no_redirect.clone()
                };

                in_flight.push(tokio::spawn(async move {
                    let response = ReqwestTransport::dispatch_one(http, request.clone()).await;
                    drop(permit);
                    (request, response)
                }));
            }

            if in_flight.is_empty() {
                break;
            }

            match in_flight.next().await {
                Some(Ok((request, response))) => {
                    for callback in &request.callbacks {
                        callback(&response);
                    }
                }
                Some(Err(join_error)) => {
                    log::warn!("transport task panicked: {join_error}");
                }
                None => break,
            }
        }
    }

    fn abort(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    fn set_max_concurrency(&self, n: usize) {
        let n = n.max(1);
        self.max_concurrency.store(n, Ordering::SeqCst);
        *self.semaphore.lock().unwrap() = Arc::new(Semaphore::new(n));
    }

    fn get_max_concurrency(&self) -> usize {
        self.max_concurrency.load(Ordering::SeqCst)
    }

    fn queue_size(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;
    use crate::request::Method;
    use std::time::Duration;
    use url::Url;

    fn sample_request(id: u64, high_priority: bool) -> Arc<Request> {
        Arc::new(Request {
            id,
            method: Method::Get,
            url: Url::parse("http://example.test/p").unwrap(),
            headers: http::HeaderMap::new(),
            body: Body::Empty,
            cookies: Default::default(),
            follow_location: true,
            high_priority,
            blocking: false,
            update_cookies: false,
            timeout: Duration::from_secs(5),
            performer: None,
            callbacks: Vec::new(),
        })
    }

    #[tokio::test]
    async fn front_queue_dispatches_before_back_queue() {
        let order = Arc::new(StdMutexOrder::default());
        let order_for_responder = order.clone();
        let transport = FakeTransport::new(move |req| {
            order_for_responder.record(req.id);
            Response {
                url: req.url.clone(),
                effective_url: req.url.clone(),
                code: 200,
                return_code: 0,
                return_message: String::new(),
                headers: http::HeaderMap::new(),
                body: bytes::Bytes::new(),
                round_trip_time: Duration::from_millis(1),
                timed_out: false,
                request: Arc::new(req.clone()),
            }
        });

        transport.queue_back(sample_request(1, false));
        transport.queue_back(sample_request(2, false));
        transport.queue_front(sample_request(3, true));

        transport.run().await;

        assert_eq!(order.snapshot(), vec![3, 1, 2]);
    }

    // Minimal recorder kept local to this test module; not worth a
    // crate-level type for one assertion.
    #[derive(Default)]
    struct StdMutexOrder {
        seen: std::sync::Mutex<Vec<u64>>,
    }

    impl StdMutexOrder {
        fn record(&self, id: u64) {
            self.seen.lock().unwrap().push(id);
        }

        fn snapshot(&self) -> Vec<u64> {
            self.seen.lock().unwrap().clone()
        }
    }
}
