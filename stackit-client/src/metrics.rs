use std::future::Future;
use std::time::Instant;

use stackit_common::Error;

/// Derives the `op` label from an HTTP method and request path (§6). Every
/// call site's path is `/v1/projects/{projectId}/...`, so the version
/// segment, the literal `projects` segment, and the opaque project id are
/// skipped first; the first remaining identifier-like segment is the
/// resource type and is kept verbatim (e.g. `load-balancers`, `volumes`). A
/// further segment after it (a resource id or sub-action) collapses to the
/// literal `instance` suffix so per-resource cardinality never leaks into
/// the metric label, e.g. `get_load-balancers` vs `get_load-balancers_instance`.
pub fn op_name(method: &str, path: &str) -> String {
    let method = method.to_ascii_lowercase();
    let path = path.split('?').next().unwrap_or(path);
    let segments_vec: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut segments: &[&str] = &segments_vec;

    if matches!(segments.first(), Some(s) if is_version_segment(s)) {
        segments = &segments[1..];
    }
    if segments.first() == Some(&"projects") {
        segments = segments.get(2..).unwrap_or(&[]);
    }

    match segments.first() {
        None => method,
        Some(first) if segments.len() > 1 => format!("{method}_{first}_instance"),
        Some(first) => format!("{method}_{first}"),
    }
}

fn is_version_segment(segment: &str) -> bool {
    segment.strip_prefix('v').is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Wraps an outbound HTTP call with the three metrics named in §6:
/// `cloud_provider_stackit_lb_requests_total{op}`,
/// `cloud_provider_stackit_lb_errors_total`,
/// `cloud_provider_stackit_lb_request_duration_seconds{op}`.
///
/// Grounded on the teacher's `common::metrics::MetricsService` tower layer,
/// adapted from inbound-server instrumentation to outbound-client calls
/// since this adapter has no HTTP server of its own to wrap.
pub async fn instrumented<Fut, T>(op: &str, fut: Fut) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
{
    let start = Instant::now();
    let result = fut.await;
    let elapsed = start.elapsed().as_secs_f64();

    metrics::counter!("cloud_provider_stackit_lb_requests_total", "op" => op.to_string())
        .increment(1);
    metrics::histogram!(
        "cloud_provider_stackit_lb_request_duration_seconds",
        "op" => op.to_string()
    )
    .record(elapsed);
    if result.is_err() {
        metrics::counter!("cloud_provider_stackit_lb_errors_total").increment(1);
    }

    result
}
