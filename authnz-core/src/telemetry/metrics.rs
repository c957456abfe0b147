//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub const REQUESTS_TOTAL: &str = "authnz_requests_total";
pub const FAILURES_TOTAL: &str = "authnz_failures_total";
pub const CACHE_LOOKUPS_TOTAL: &str = "authnz_cache_lookups_total";
pub const KEY_FETCH_DURATION: &str = "authnz_key_fetch_duration_seconds";

/// `cache` label values for `authnz_cache_lookups_total`
pub const CACHE_PERMISSION: &str = "permission";
pub const CACHE_USER_ROLE: &str = "user_role";
pub const CACHE_ROLE: &str = "role";

/// Outcome label for `authnz_requests_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestResult {
    Ok,
    Skipped,
    Override,
    Unauthenticated,
    PermissionDenied,
}

impl RequestResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestResult::Ok => "ok",
            RequestResult::Skipped => "skipped",
            RequestResult::Override => "override",
            RequestResult::Unauthenticated => "unauthenticated",
            RequestResult::PermissionDenied => "permission_denied",
        }
    }
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    // Key fetches are network-bound, so the buckets start at 1ms.
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions so HELP/TYPE lines appear from startup.
pub fn describe_metrics() {
    describe_counter!(
        REQUESTS_TOTAL,
        "Total number of RPC calls seen by the auth pipeline, by outcome"
    );
    describe_counter!(
        FAILURES_TOTAL,
        "Pipeline failures by error kind"
    );
    describe_counter!(
        CACHE_LOOKUPS_TOTAL,
        "Permission, user-role and role cache lookups by cache and hit/miss"
    );
    describe_histogram!(
        KEY_FETCH_DURATION,
        "Public key fetch duration in seconds"
    );

    counter!(REQUESTS_TOTAL, "result" => "ok").absolute(0);
    for cache in [CACHE_PERMISSION, CACHE_USER_ROLE, CACHE_ROLE] {
        counter!(CACHE_LOOKUPS_TOTAL, "cache" => cache, "result" => "hit").absolute(0);
    }
}

pub fn record_request(result: RequestResult) {
    counter!(REQUESTS_TOTAL, "result" => result.as_str()).increment(1);
}

pub fn record_failure(kind: &'static str) {
    counter!(FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!(CACHE_LOOKUPS_TOTAL, "cache" => cache, "result" => result).increment(1);
}

pub fn record_key_fetch(elapsed: Duration) {
    histogram!(KEY_FETCH_DURATION).record(elapsed.as_secs_f64());
}
