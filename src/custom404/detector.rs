//! Directory fingerprint records, probe dispatch, waiter dedup, and
//! classification.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::oneshot;
use url::Url;

use crate::response::Response;
use crate::signature::Signature;

use super::key::directory_key;
use super::probes::{generate_probes, GENERATOR_COUNT};

/// Issues one probe GET and resolves to its `Response`. Supplied by
/// [`crate::client::Client`], which is the only thing that owns a
/// transport to dispatch through.
pub type ProbeLauncher =
    Arc<dyn Fn(Url) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

struct SignatureSlot {
    body: Option<Signature>,
    rdiff: Option<Signature>,
}

impl SignatureSlot {
    fn empty() -> Self {
        Self { body: None, rdiff: None }
    }

    /// Folds one more observed probe body into this slot: the first
    /// sample becomes `body`; every sample after that refines `rdiff`.
    fn observe(&mut self, body: &[u8], threshold: f64) {
        match (&self.body, &self.rdiff) {
            (None, _) => self.body = Some(Signature::new(body, threshold)),
            (Some(_), Some(rdiff)) => self.rdiff = Some(rdiff.refine(body)),
            (Some(base), None) => self.rdiff = Some(base.refine(body)),
        }
    }

    /// True if `candidate`'s signature is within threshold of the
    /// accumulated refinement for this generator.
    fn matches(&self, candidate: &[u8]) -> bool {
        match (&self.body, &self.rdiff) {
            (Some(base), Some(rdiff)) => rdiff.similar(&base.refine(candidate)),
            (Some(base), None) => base.similar(&base.refine(candidate)),
            (None, _) => false,
        }
    }
}

struct Waiter {
    body: Bytes,
    code: u16,
    respond: oneshot::Sender<bool>,
}

struct DirectoryRecord {
    analyzed: bool,
    in_progress: bool,
    waiting: Vec<Waiter>,
    signatures: Vec<SignatureSlot>,
    last_accessed: Instant,
}

impl DirectoryRecord {
    fn new() -> Self {
        Self {
            analyzed: false,
            in_progress: false,
            waiting: Vec::new(),
            signatures: (0..GENERATOR_COUNT).map(|_| SignatureSlot::empty()).collect(),
            last_accessed: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    fn matches_any(&self, body: &[u8]) -> bool {
        self.signatures.iter().any(|slot| slot.matches(body))
    }
}

/// Per-directory soft-404 fingerprint cache, shared across a `Client`.
pub struct CustomFourZeroFourDetector {
    records: Mutex<HashMap<String, DirectoryRecord>>,
    regular_404_dirs: Mutex<HashSet<String>>,
    signature_threshold: f64,
    precision: usize,
}

impl CustomFourZeroFourDetector {
    pub fn new(signature_threshold: f64, precision: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            regular_404_dirs: Mutex::new(HashSet::new()),
            signature_threshold,
            precision,
        }
    }

    /// Whether `url`'s directory has a completed fingerprint already.
    pub fn checked_for_custom_404(&self, url: &Url) -> bool {
        let key = directory_key(url);
        self.records.lock().unwrap().get(&key).is_some_and(|r| r.analyzed)
    }

    /// Whether `url`'s directory has never been looked at (no record,
    /// or a record that isn't yet analyzed and isn't in progress).
    pub fn needs_custom_404_check(&self, url: &Url) -> bool {
        let key = directory_key(url);
        match self.records.lock().unwrap().get(&key) {
            None => true,
            Some(r) => !r.analyzed && !r.in_progress,
        }
    }

    /// Classifies `response.body` against `url`'s directory fingerprint,
    /// fingerprinting the directory first if it hasn't been analyzed
    /// yet. `launch` dispatches one probe GET and awaits its response.
    ///
    /// If fingerprinting for this directory is already under way, this
    /// call is parked as a waiter and resolved once that run completes
    /// — at most one fingerprinting probe set is ever in flight per
    /// directory, regardless of how many callers ask concurrently.
    pub async fn classify(&self, url: &Url, response: &Response, launch: &ProbeLauncher) -> bool {
        let key = directory_key(url);

        enum Action {
            Analyzed,
            Wait(oneshot::Receiver<bool>),
            Fingerprint,
        }

        let action = {
            let mut records = self.records.lock().unwrap();
            let record = records.entry(key.clone()).or_insert_with(DirectoryRecord::new);
            record.touch();
            if record.analyzed {
                Action::Analyzed
            } else if record.in_progress {
                let (tx, rx) = oneshot::channel();
                record.waiting.push(Waiter {
                    body: response.body.clone(),
                    code: response.code,
                    respond: tx,
                });
                Action::Wait(rx)
            } else {
                record.in_progress = true;
                Action::Fingerprint
            }
        };

        match action {
            Action::Analyzed => self.is_404(&key, response.body.as_ref(), response.code),
            Action::Wait(rx) => rx.await.unwrap_or(false),
            Action::Fingerprint => {
                self.fingerprint_and_classify(key, url, response, launch).await
            }
        }
    }

    async fn fingerprint_and_classify(
        &self,
        key: String,
        url: &Url,
        response: &Response,
        launch: &ProbeLauncher,
    ) -> bool {
        let probes = generate_probes(url, self.precision);
        let total = probes.len();
        let results = futures::future::join_all(probes.into_iter().map(|probe| {
            let launch = launch.clone();
            async move {
                let resp = launch(probe.url).await;
                (probe.generator, resp)
            }
        }))
        .await;

        let real_404_count = results.iter().filter(|(_, resp)| resp.code == 404).count();

        let waiting = {
            let mut records = self.records.lock().unwrap();
            let record = records.get_mut(&key).expect("record inserted before fingerprinting");
            for (generator, resp) in &results {
                record.signatures[*generator].observe(resp.body.as_ref(), self.signature_threshold);
            }
            record.analyzed = true;
            record.in_progress = false;
            std::mem::take(&mut record.waiting)
        };

        if real_404_count == total {
            self.regular_404_dirs.lock().unwrap().insert(key.clone());
        }

        for waiter in waiting {
            let result = self.is_404(&key, waiter.body.as_ref(), waiter.code);
            let _ = waiter.respond.send(result);
        }

        // Open question resolved: the classification offered for the
        // call that triggered fingerprinting uses the *outer*
        // `response.body` passed in, not a body sampled during
        // fingerprinting.
        self.is_404(&key, response.body.as_ref(), response.code)
    }

    /// True if `code` is a real HTTP 404, or `body` matches `key`'s own
    /// directory fingerprint (unless `key` is a known "regular" 404
    /// directory — one whose probes all returned a genuine 404, so it
    /// has no custom not-found page and its (empty or incidental)
    /// signature slots are never trusted for a match), or — failing
    /// both — any other *analyzed* directory's fingerprint.
    fn is_404(&self, key: &str, body: &[u8], code: u16) -> bool {
        if code == 404 {
            return true;
        }

        let records = self.records.lock().unwrap();
        let is_regular = self.regular_404_dirs.lock().unwrap().contains(key);
        if !is_regular {
            if let Some(record) = records.get(key) {
                if record.matches_any(body) {
                    return true;
                }
            }
        }
        records
            .iter()
            .filter(|(k, r)| k.as_str() != key && r.analyzed)
            .any(|(_, r)| r.matches_any(body))
    }

    /// Drops analyzed records, least-recently-used first, until the
    /// record count is at or below `cache_size` — or until only
    /// in-progress records remain. Run at the end of every burst.
    pub fn prune(&self, cache_size: usize) {
        let mut records = self.records.lock().unwrap();
        if records.len() <= cache_size {
            return;
        }

        let mut analyzed_keys: Vec<(String, Instant)> = records
            .iter()
            .filter(|(_, r)| r.analyzed)
            .map(|(k, r)| (k.clone(), r.last_accessed))
            .collect();
        analyzed_keys.sort_by_key(|(_, last_accessed)| *last_accessed);

        let mut overflow = records.len() - cache_size;
        for (key, _) in analyzed_keys {
            if overflow == 0 {
                break;
            }
            records.remove(&key);
            overflow -= 1;
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn response_with(url: &Url, code: u16, body: &'static [u8]) -> Response {
        Response {
            url: url.clone(),
            effective_url: url.clone(),
            code,
            return_code: 0,
            return_message: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body),
            round_trip_time: Duration::from_millis(1),
            timed_out: false,
            request: sample_request(url),
        }
    }

    fn sample_request(url: &Url) -> Arc<crate::request::Request> {
        Arc::new(crate::request::Request {
            id: 1,
            method: crate::request::Method::Get,
            url: url.clone(),
            headers: HeaderMap::new(),
            body: crate::request::Body::Empty,
            cookies: Default::default(),
            follow_location: true,
            high_priority: true,
            blocking: false,
            update_cookies: false,
            timeout: Duration::from_secs(5),
            performer: None,
            callbacks: Vec::new(),
        })
    }

    fn soft_404_launcher(soft_body: &'static [u8]) -> ProbeLauncher {
        Arc::new(move |probe_url: Url| {
            Box::pin(async move { response_with(&probe_url, 200, soft_body) })
        })
    }

    #[tokio::test]
    async fn similar_body_classifies_as_404_after_fingerprinting() {
        let detector = CustomFourZeroFourDetector::new(0.1, 2);
        let url: Url = "http://h/dir/file.ext".parse().unwrap();
        let launch = soft_404_launcher(b"Sorry, page not found on this server");
        let triggering = response_with(&url, 200, b"Sorry, page not found on this server");

        let result = detector.classify(&url, &triggering, &launch).await;
        assert!(result);
        assert!(detector.checked_for_custom_404(&url));
    }

    #[tokio::test]
    async fn dissimilar_body_does_not_classify_as_404() {
        let detector = CustomFourZeroFourDetector::new(0.1, 2);
        let url: Url = "http://h/dir/file.ext".parse().unwrap();
        let launch = soft_404_launcher(b"Sorry, page not found on this server");
        let triggering = response_with(&url, 200, b"Sorry, page not found on this server");
        detector.classify(&url, &triggering, &launch).await;

        let other: Response = response_with(&url, 200, b"welcome to your dashboard overview");
        assert!(!detector.is_404(&directory_key(&url), other.body.as_ref(), other.code));
    }

    #[tokio::test]
    async fn a_real_404_status_always_classifies_as_404() {
        let detector = CustomFourZeroFourDetector::new(0.1, 2);
        let url: Url = "http://h/dir/file.ext".parse().unwrap();
        let launch = soft_404_launcher(b"some custom not-found page");
        let triggering = response_with(&url, 200, b"some custom not-found page");
        detector.classify(&url, &triggering, &launch).await;

        // A genuine HTTP 404 is always a 404, regardless of body content.
        assert!(detector.is_404(&directory_key(&url), b"anything at all", 404));
    }

    #[tokio::test]
    async fn a_real_404_only_directory_never_soft_404_matches_by_coincidence() {
        let detector = CustomFourZeroFourDetector::new(0.1, 2);
        let url: Url = "http://h/dir/file.ext".parse().unwrap();
        // Every probe in this directory returns a genuine 404.
        let launch: ProbeLauncher = Arc::new(|probe_url: Url| {
            Box::pin(async move { response_with(&probe_url, 404, b"not found") })
        });
        let triggering = response_with(&url, 404, b"not found");
        detector.classify(&url, &triggering, &launch).await;

        // A later 200 response whose body happens to resemble the 404
        // probes' body must not be classified as a soft 404 — this
        // directory has no custom not-found page.
        let other: Response = response_with(&url, 200, b"not found");
        assert!(!detector.is_404(&directory_key(&url), other.body.as_ref(), other.code));
    }

    #[tokio::test]
    async fn an_empty_probe_body_does_not_poison_the_directory_fingerprint() {
        let detector = CustomFourZeroFourDetector::new(0.1, 2);
        let url: Url = "http://h/dir/file.ext".parse().unwrap();
        // Every probe fails at the transport and comes back empty.
        let launch: ProbeLauncher = Arc::new(|probe_url: Url| {
            Box::pin(async move { response_with(&probe_url, 0, b"") })
        });
        let triggering = response_with(&url, 200, b"");
        detector.classify(&url, &triggering, &launch).await;

        let other: Response = response_with(&url, 200, b"a perfectly ordinary page of content");
        assert!(!detector.is_404(&directory_key(&url), other.body.as_ref(), other.code));
    }

    #[tokio::test]
    async fn concurrent_calls_to_the_same_directory_launch_one_probe_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_launcher = calls.clone();
        let launch: ProbeLauncher = Arc::new(move |probe_url: Url| {
            let calls = calls_for_launcher.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                response_with(&probe_url, 200, b"not found sorry")
            })
        });

        let detector = Arc::new(CustomFourZeroFourDetector::new(0.1, 2));
        let urls: Vec<Url> = (0..5)
            .map(|i| format!("http://h/dir/page{i}.html").parse().unwrap())
            .collect();

        let mut handles = Vec::new();
        for url in urls {
            let detector = detector.clone();
            let launch = launch.clone();
            handles.push(tokio::spawn(async move {
                let response = response_with(&url, 200, b"not found sorry");
                detector.classify(&url, &response, &launch).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }

        // 5 urls share one directory, so exactly one fingerprinting run
        // (5 generators x precision 2 = 10 probes) should have fired.
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(detector.record_count(), 1);
    }

    #[tokio::test]
    async fn prune_drops_analyzed_records_down_to_the_cache_size() {
        let detector = CustomFourZeroFourDetector::new(0.1, 1);
        let launch = soft_404_launcher(b"not found");

        for i in 0..5 {
            let url: Url = format!("http://h/dir{i}/file.ext").parse().unwrap();
            let response = response_with(&url, 200, b"not found");
            detector.classify(&url, &response, &launch).await;
        }

        assert_eq!(detector.record_count(), 5);
        detector.prune(2);
        assert!(detector.record_count() <= 2);
    }
}
