//! Bounded, throttled fan-out of independent async units.
//!
//! A [`Dispatcher`] launches one task per input item. Three things shape the
//! launch loop:
//!
//! 1. **Throttle**: before each launch the loop waits for the next dispatch
//!    slot. Slots are spaced `max(1s, 60s / rpm)` apart. This bounds the
//!    *dispatch* rate, not the call rate, so it is an approximation under
//!    varying latency.
//! 2. **Limiter**: a [`Semaphore`] permit is acquired before spawning and
//!    held by the task until it finishes.
//! 3. **Error policy**: with [`ErrorPolicy::RunToCompletion`] every launched
//!    unit finishes and only the first error (in completion order) is kept.
//!    [`ErrorPolicy::FailFast`] stops launching and aborts in-flight units
//!    after the first error.
//!
//! Results come back aligned with the input order regardless of completion
//! order. Cloned dispatchers share their limiter and throttle, so several
//! concurrent fan-outs stay within one global budget.

use anyhow::{anyhow, Error, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Minimum spacing between two dispatches.
pub const MIN_DISPATCH_INTERVAL: Duration = Duration::from_secs(1);

/// `max(1s, 60s / rpm)`.
pub fn dispatch_interval(requests_per_minute: u32) -> Duration {
    let per_request = Duration::from_secs(60) / requests_per_minute.max(1);
    per_request.max(MIN_DISPATCH_INTERVAL)
}

/// Hands out dispatch slots spaced by a fixed interval.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    next: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(None),
        }
    }

    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(dispatch_interval(requests_per_minute))
    }

    /// A throttle that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next slot. The first call returns immediately.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    RunToCompletion,
    FailFast,
}

/// Output of [`Dispatcher::run`].
#[derive(Debug)]
pub struct FanOutOutcome<T> {
    /// `results[i]` belongs to input `i`; `None` where the unit failed or never ran.
    pub results: Vec<Option<T>>,
    pub first_error: Option<Error>,
    pub failures: usize,
}

impl<T> FanOutOutcome<T> {
    pub fn succeeded(&self) -> impl Iterator<Item = &T> {
        self.results.iter().flatten()
    }

    /// All results, or the first error.
    pub fn into_result(self) -> Result<Vec<T>> {
        if let Some(e) = self.first_error {
            return Err(e);
        }
        Ok(self.results.into_iter().flatten().collect())
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    limiter: Arc<Semaphore>,
    throttle: Arc<Throttle>,
    policy: ErrorPolicy,
}

impl Dispatcher {
    pub fn new(parallelism: usize, throttle: Throttle) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(parallelism.max(1))),
            throttle: Arc::new(throttle),
            policy: ErrorPolicy::default(),
        }
    }

    /// Limiter of `parallelism` permits plus an rpm-derived throttle.
    pub fn for_rate(parallelism: usize, requests_per_minute: u32) -> Self {
        Self::new(parallelism, Throttle::per_minute(requests_per_minute))
    }

    /// Limiter only.
    pub fn unthrottled(parallelism: usize) -> Self {
        Self::new(parallelism, Throttle::disabled())
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run a single unit under the same throttle and limiter.
    pub async fn once<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.throttle.wait().await;
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| anyhow!("limiter closed: {}", e))?;
        fut.await
    }

    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, f: F) -> FanOutOutcome<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut collector = Collector::new(items.len());
        let mut set = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            if self.policy == ErrorPolicy::FailFast && collector.first_error.is_some() {
                break;
            }
            self.throttle.wait().await;
            let permit = match self.limiter.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    collector.record(index, Err(anyhow!("limiter closed: {}", e)));
                    break;
                }
            };
            let fut = f(index, item);
            set.spawn(async move {
                let _permit = permit;
                (index, fut.await)
            });

            while let Some(joined) = set.try_join_next() {
                collector.joined(joined);
            }
        }

        while let Some(joined) = set.join_next().await {
            collector.joined(joined);
            if self.policy == ErrorPolicy::FailFast && collector.first_error.is_some() {
                set.abort_all();
            }
        }

        collector.finish()
    }
}

struct Collector<T> {
    results: Vec<Option<T>>,
    first_error: Option<Error>,
    failures: usize,
}

impl<T> Collector<T> {
    fn new(len: usize) -> Self {
        Self {
            results: (0..len).map(|_| None).collect(),
            first_error: None,
            failures: 0,
        }
    }

    fn record(&mut self, index: usize, result: Result<T>) {
        match result {
            Ok(value) => self.results[index] = Some(value),
            Err(e) => {
                self.failures += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
            }
        }
    }

    fn joined(&mut self, joined: Result<(usize, Result<T>), tokio::task::JoinError>) {
        match joined {
            Ok((index, result)) => self.record(index, result),
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                self.failures += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(anyhow!("task failed: {}", e));
                }
            }
        }
    }

    fn finish(self) -> FanOutOutcome<T> {
        FanOutOutcome {
            results: self.results,
            first_error: self.first_error,
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn interval_has_one_second_floor() {
        assert_eq!(dispatch_interval(60), Duration::from_secs(1));
        assert_eq!(dispatch_interval(600), Duration::from_secs(1));
        assert_eq!(dispatch_interval(30), Duration::from_secs(2));
        assert_eq!(dispatch_interval(0), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_input_order() {
        let dispatcher = Dispatcher::unthrottled(4);
        // Later items finish first.
        let outcome = dispatcher
            .run(vec![30u64, 20, 10], |_, delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(delay * 2)
            })
            .await;
        assert!(outcome.first_error.is_none());
        assert_eq!(outcome.results, vec![Some(60), Some(40), Some(20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_is_spaced_by_throttle() {
        let dispatcher = Dispatcher::for_rate(8, 60);
        let started = Instant::now();
        let outcome = dispatcher
            .run(vec![(); 3], move |_, _| async move { Ok(started.elapsed()) })
            .await;
        let launched: Vec<Duration> = outcome.results.into_iter().flatten().collect();
        assert_eq!(
            launched,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_limit() {
        let dispatcher = Dispatcher::unthrottled(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let outcome = dispatcher
            .run(vec![(); 6], |_, _| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        assert_eq!(outcome.succeeded().count(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_to_completion_keeps_first_error_in_completion_order() {
        let dispatcher = Dispatcher::unthrottled(4);
        let outcome = dispatcher
            .run(vec![50u64, 10, 30, 5], |index, delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                if index == 0 || index == 2 {
                    bail!("unit {} failed", index);
                }
                Ok(index)
            })
            .await;
        assert_eq!(outcome.failures, 2);
        assert_eq!(outcome.results, vec![None, Some(1), None, Some(3)]);
        // Unit 2 finishes at 30ms, before unit 0 at 50ms.
        assert_eq!(outcome.first_error.unwrap().to_string(), "unit 2 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_stops_launching() {
        let dispatcher = Dispatcher::unthrottled(1).with_policy(ErrorPolicy::FailFast);
        let launched = Arc::new(AtomicUsize::new(0));
        let outcome = dispatcher
            .run(vec![(); 5], |index, _| {
                let launched = launched.clone();
                async move {
                    launched.fetch_add(1, Ordering::SeqCst);
                    if index == 0 {
                        bail!("boom");
                    }
                    Ok(index)
                }
            })
            .await;
        assert!(outcome.first_error.is_some());
        assert!(launched.load(Ordering::SeqCst) < 5);
        assert!(outcome.into_result().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn once_takes_the_next_slot() {
        let dispatcher = Dispatcher::for_rate(2, 30);
        let started = Instant::now();
        let first = dispatcher.once(async { Ok(started.elapsed()) }).await.unwrap();
        let second = dispatcher.once(async { Ok(started.elapsed()) }).await.unwrap();
        assert_eq!(first, Duration::ZERO);
        assert_eq!(second, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_one_budget() {
        let dispatcher = Dispatcher::unthrottled(1);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let work = |d: Dispatcher| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                d.run(vec![(); 3], move |_, _| {
                    let in_flight = in_flight.clone();
                    let peak = peak.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await
            }
        };

        let (a, b) = tokio::join!(work(dispatcher.clone()), work(dispatcher.clone()));
        assert_eq!(a.succeeded().count() + b.succeeded().count(), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
