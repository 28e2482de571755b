//! Client-wide request/response counters and derived rates.
//!
//! Every counter lives behind one [`std::sync::Mutex`] rather than a
//! handful of independent atomics, so a `statistics()` snapshot can
//! never observe one counter updated and a related one (e.g. response
//! count vs. response time sum) still stale — the numerator and its
//! denominator are always read together.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Inner {
    request_count: u64,
    response_count: u64,
    time_out_count: u64,
    total_time_sum: Duration,
    burst_request_count: u64,
    burst_response_count: u64,
    burst_time_sum: Duration,
    total_runtime_start: Instant,
    burst_runtime_start: Instant,
}

/// Monotonic request/response counters plus burst (since the current
/// `run`) and total (since the `Client` was created) derived rates.
pub struct Statistics {
    inner: Mutex<Inner>,
}

impl Statistics {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: Mutex::new(Inner {
                request_count: 0,
                response_count: 0,
                time_out_count: 0,
                total_time_sum: Duration::ZERO,
                burst_request_count: 0,
                burst_response_count: 0,
                burst_time_sum: Duration::ZERO,
                total_runtime_start: now,
                burst_runtime_start: now,
            }),
        }
    }

    /// Records one request having been handed to the transport.
    pub fn record_request(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.request_count += 1;
        inner.burst_request_count += 1;
    }

    /// Records one completed response, including its round-trip time
    /// and whether it was a timeout.
    pub fn record_response(&self, round_trip_time: Duration, timed_out: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.response_count += 1;
        inner.burst_response_count += 1;
        inner.total_time_sum += round_trip_time;
        inner.burst_time_sum += round_trip_time;
        if timed_out {
            inner.time_out_count += 1;
        }
    }

    /// Resets the burst view; called at the start of every [`run`](crate::client::Client::run).
    pub fn begin_burst(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.burst_request_count = 0;
        inner.burst_response_count = 0;
        inner.burst_time_sum = Duration::ZERO;
        inner.burst_runtime_start = Instant::now();
    }

    /// Resets every counter, burst and total alike, and restarts both
    /// runtime clocks. Used by [`crate::client::Client::reset`].
    pub fn reset_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.request_count = 0;
        inner.response_count = 0;
        inner.time_out_count = 0;
        inner.total_time_sum = Duration::ZERO;
        inner.burst_request_count = 0;
        inner.burst_response_count = 0;
        inner.burst_time_sum = Duration::ZERO;
        inner.total_runtime_start = now;
        inner.burst_runtime_start = now;
    }

    pub fn request_count(&self) -> u64 {
        self.inner.lock().unwrap().request_count
    }

    pub fn response_count(&self) -> u64 {
        self.inner.lock().unwrap().response_count
    }

    pub fn time_out_count(&self) -> u64 {
        self.inner.lock().unwrap().time_out_count
    }

    /// Snapshot of every named counter and derived rate, for the public
    /// `statistics()` API.
    pub fn snapshot(&self) -> HashMap<&'static str, f64> {
        let inner = self.inner.lock().unwrap();
        let total_runtime = inner.total_runtime_start.elapsed();
        let burst_runtime = inner.burst_runtime_start.elapsed();

        let mut map = HashMap::new();
        map.insert("request_count", inner.request_count as f64);
        map.insert("response_count", inner.response_count as f64);
        map.insert("time_out_count", inner.time_out_count as f64);
        map.insert("total_runtime", total_runtime.as_secs_f64());
        map.insert("burst_runtime", burst_runtime.as_secs_f64());
        map.insert(
            "total_average_response_time",
            rate(inner.total_time_sum.as_secs_f64(), inner.response_count),
        );
        map.insert(
            "burst_average_response_time",
            rate(inner.burst_time_sum.as_secs_f64(), inner.burst_response_count),
        );
        map.insert(
            "total_responses_per_second",
            if total_runtime.as_secs_f64() > 0.0 {
                inner.response_count as f64 / total_runtime.as_secs_f64()
            } else {
                0.0
            },
        );
        map.insert(
            "burst_responses_per_second",
            if burst_runtime.as_secs_f64() > 0.0 {
                inner.burst_response_count as f64 / burst_runtime.as_secs_f64()
            } else {
                0.0
            },
        );
        map
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

/// `numerator / denominator`, or `0.0` when the denominator is zero —
/// every rate in `Statistics` must not divide by zero.
fn rate(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_statistics_have_zero_rates() {
        let stats = Statistics::new();
        let snap = stats.snapshot();
        assert_eq!(snap["request_count"], 0.0);
        assert_eq!(snap["total_average_response_time"], 0.0);
        assert_eq!(snap["burst_responses_per_second"], 0.0);
    }

    #[test]
    fn response_count_and_time_out_count_track_recorded_responses() {
        let stats = Statistics::new();
        stats.record_request();
        stats.record_request();
        stats.record_response(Duration::from_millis(10), false);
        stats.record_response(Duration::from_millis(20), true);

        assert_eq!(stats.request_count(), 2);
        assert_eq!(stats.response_count(), 2);
        assert_eq!(stats.time_out_count(), 1);
    }

    #[test]
    fn begin_burst_resets_burst_counters_but_not_total() {
        let stats = Statistics::new();
        stats.record_response(Duration::from_millis(5), false);
        stats.begin_burst();
        let snap = stats.snapshot();
        assert_eq!(snap["response_count"], 1.0);
        assert_eq!(snap["burst_average_response_time"], 0.0);
    }
}
