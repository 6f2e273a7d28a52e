//! Duration and failure tracking for async operations

use crate::clock::Clock;
use crate::logging::TARGET;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Times async operations and reports their outcome.
///
/// The timer is a pure observer: results and errors pass through unchanged.
/// It is cheap to clone, so it can be moved into tasks without borrowing
/// the monitor it came from.
#[derive(Debug, Clone)]
pub struct OperationTimer {
    enabled: bool,
    slow_operation: Duration,
    clock: Arc<dyn Clock>,
}

impl OperationTimer {
    /// Create a timer.
    pub fn new(enabled: bool, slow_operation: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled,
            slow_operation,
            clock,
        }
    }

    /// Whether timing is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `operation` and return its result unchanged.
    ///
    /// When enabled, logs the start, the completion time (with a warning
    /// above the slow-operation threshold) or the failure with its elapsed
    /// time. When disabled, only runs the operation.
    pub async fn measure<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if !self.enabled {
            return operation().await;
        }

        let start = self.clock.now();
        tracing::debug!(target: TARGET, operation = name, "Starting {}", name);

        let result = operation().await;
        let duration = self.clock.now().saturating_duration_since(start);
        let duration_ms = duration.as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => {
                tracing::debug!(
                    target: TARGET,
                    operation = name,
                    duration_ms = duration_ms,
                    "Completed {} in {:.2}ms",
                    name,
                    duration_ms
                );
                if duration > self.slow_operation {
                    tracing::warn!(
                        target: TARGET,
                        operation = name,
                        duration_ms = duration_ms,
                        "Slow operation: {} took {:.2}ms",
                        name,
                        duration_ms
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    target: TARGET,
                    operation = name,
                    duration_ms = duration_ms,
                    error = %err,
                    "Failed {} after {:.2}ms: {}",
                    name,
                    duration_ms,
                    err
                );
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_support::capture;
    use tracing::Level;

    #[derive(Debug, PartialEq)]
    struct FetchError {
        code: u16,
    }

    impl fmt::Display for FetchError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "upstream returned {}", self.code)
        }
    }

    fn timer(enabled: bool) -> (OperationTimer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let timer = OperationTimer::new(enabled, Duration::from_millis(1000), clock.clone());
        (timer, clock)
    }

    #[tokio::test]
    async fn test_success_passes_value_through() {
        let (logs, _guard) = capture();
        let (timer, clock) = timer(true);

        let value = timer
            .measure("load_profile", || async move {
                clock.advance_ms(20);
                Ok::<_, FetchError>("profile")
            })
            .await;

        assert_eq!(value, Ok("profile"));
        assert_eq!(logs.count_containing(Level::DEBUG, "Starting load_profile"), 1);
        assert_eq!(
            logs.count_containing(Level::DEBUG, "Completed load_profile in 20.00ms"),
            1
        );
        assert_eq!(logs.count(Level::WARN), 0);
    }

    #[tokio::test]
    async fn test_failure_is_returned_unchanged() {
        let (logs, _guard) = capture();
        let (timer, clock) = timer(true);

        let result: Result<(), FetchError> = timer
            .measure("sync", || async move {
                clock.advance_ms(250);
                Err(FetchError { code: 503 })
            })
            .await;

        assert_eq!(result, Err(FetchError { code: 503 }));
        assert_eq!(logs.count(Level::ERROR), 1);
        assert_eq!(
            logs.count_containing(
                Level::ERROR,
                "Failed sync after 250.00ms: upstream returned 503"
            ),
            1
        );
    }

    #[tokio::test]
    async fn test_slow_operation_boundary() {
        let (logs, _guard) = capture();
        let (timer, clock) = timer(true);

        let at_threshold = clock.clone();
        timer
            .measure("boundary", || async move {
                at_threshold.advance_ms(1000);
                Ok::<_, FetchError>(())
            })
            .await
            .unwrap();
        assert_eq!(logs.count(Level::WARN), 0);

        timer
            .measure("over", || async move {
                clock.advance_ms(1001);
                Ok::<_, FetchError>(())
            })
            .await
            .unwrap();
        assert_eq!(logs.count(Level::WARN), 1);
        assert_eq!(logs.count_containing(Level::WARN, "Slow operation: over"), 1);
    }

    #[tokio::test]
    async fn test_disabled_runs_operation_silently() {
        let (logs, _guard) = capture();
        let (timer, _clock) = timer(false);

        let ok = timer
            .measure("noop", || async { Ok::<_, FetchError>(7) })
            .await;
        let err: Result<u8, FetchError> = timer
            .measure("noop", || async { Err(FetchError { code: 404 }) })
            .await;

        assert_eq!(ok, Ok(7));
        assert_eq!(err, Err(FetchError { code: 404 }));
        assert!(logs.events().is_empty());
    }

    #[tokio::test]
    async fn test_measure_with_real_sleep() {
        let timer = OperationTimer::new(
            true,
            Duration::from_millis(1000),
            Arc::new(crate::clock::SystemClock),
        );

        let result = timer
            .measure("sleep", || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, std::io::Error>(())
            })
            .await;
        assert!(result.is_ok());
    }
}
