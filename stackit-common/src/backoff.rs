use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// A bounded exponential backoff schedule: `steps` delays of
/// `initial * factor^n`. Grounded on the teacher's
/// `common::wait::backoff_full_jitter`, but deterministic (no jitter) and
/// parameterized by the concrete tuning knobs spec §4.4 names (20s × 1.28^n,
/// 5 steps ⇒ cumulative ≈ 120s) rather than a fixed base/cap.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: f64,
    pub steps: usize,
}

impl Backoff {
    pub const fn new(initial: Duration, factor: f64, steps: usize) -> Self {
        Self {
            initial,
            factor,
            steps,
        }
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.steps).map(move |n| {
            let scaled = self.initial.as_secs_f64() * self.factor.powi(n as i32);
            Duration::from_secs_f64(scaled)
        })
    }

    pub fn cumulative(&self) -> Duration {
        self.delays().sum()
    }
}

/// Polls `check` on the schedule described by `backoff` until it returns
/// `Some(value)`, the cancellation token fires, or the schedule is
/// exhausted. `check` is called once before the first sleep and once more
/// after the final delay, so a `steps`-step schedule makes `steps + 1`
/// observations.
pub async fn poll_until<F, Fut, T>(
    backoff: &Backoff,
    cancel: &CancellationToken,
    timeout_msg: &str,
    mut check: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, Error>>,
{
    if let Some(v) = check().await? {
        return Ok(v);
    }
    for delay in backoff.delays() {
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::internal("wait cancelled")),
            _ = tokio::time::sleep(delay) => {}
        }
        if let Some(v) = check().await? {
            return Ok(v);
        }
    }
    Err(Error::internal(timeout_msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_matches_spec_tuning_knobs() {
        let b = Backoff::new(Duration::from_secs(20), 1.28, 5);
        let delays: Vec<Duration> = b.delays().collect();
        assert_eq!(delays.len(), 5);
        assert_eq!(delays[0], Duration::from_secs(20));
        // cumulative approx 120s as spec's doc comment states
        let total = b.cumulative().as_secs_f64();
        assert!((110.0..140.0).contains(&total), "total={total}");
    }

    #[tokio::test]
    async fn poll_until_returns_as_soon_as_check_succeeds() {
        let b = Backoff::new(Duration::from_millis(1), 1.0, 3);
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let result = poll_until(&b, &cancel, "timed out", || {
            calls += 1;
            let ready = calls >= 2;
            async move { Ok(ready.then_some(calls)) }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn poll_until_times_out_after_schedule_exhausted() {
        let b = Backoff::new(Duration::from_millis(1), 1.0, 2);
        let cancel = CancellationToken::new();
        let result: Result<i32, Error> =
            poll_until(&b, &cancel, "timed out waiting", || async { Ok(None) }).await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
