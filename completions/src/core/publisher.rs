//! Publishing with bounded retries
//!
//! One publish call is a small state machine:
//!
//! ```text
//! Attempting{1} ──ok──────────────────────────────▶ Succeeded
//!      │ transient failure, attempts left
//!      ▼ (sleep)
//! Attempting{n+1} ... ──permanent failure / cap──▶ Failed{last_failure}
//! ```
//!
//! The remote store overwrites on the same destination, so repeating a push
//! after an ambiguous failure does not create a second copy.

use std::sync::Arc;

use shared::{CompletionTable, DatasetDestination, PublishFailure, Stage, stage_debug, stage_error, stage_info, stage_warn};
use crate::error::{CompletionsError, CompletionsResult};
use crate::traits::HubPublisher;
use crate::types::{PublishReport, PublishState, RetryPolicy};

/// Pushes a table to the hub, retrying transient failures
pub struct RetryingPublisher<H>
where
    H: HubPublisher + 'static,
{
    hub: Arc<H>,
    policy: RetryPolicy,
}

impl<H> RetryingPublisher<H>
where
    H: HubPublisher + 'static,
{
    pub fn new(hub: Arc<H>, policy: RetryPolicy) -> Self {
        Self { hub, policy }
    }

    /// Publish `table` to `destination`.
    ///
    /// Returns the number of attempts on success. On failure the error carries the
    /// failure of the last attempt made.
    pub async fn publish(&self, table: &CompletionTable, destination: &DatasetDestination) -> CompletionsResult<PublishReport> {
        if self.policy.max_attempts == 0 {
            return Err(CompletionsError::config("max_publish_attempts must be at least 1"));
        }

        stage_info!(
            Stage::Publish,
            "📤 Publishing {} rows to {} (up to {} attempts)",
            table.len(),
            destination,
            self.policy.max_attempts
        );

        let mut state = PublishState::start();
        loop {
            state = match state {
                PublishState::Attempting { attempt, last_failure } => {
                    self.attempt(attempt, last_failure.as_ref(), table, destination).await
                }
                PublishState::Succeeded { attempts } => {
                    stage_info!(Stage::Publish, "✅ Published {} after {} attempt(s)", destination, attempts);
                    return Ok(PublishReport {
                        destination: destination.to_string(),
                        attempts,
                        rows: table.len(),
                    });
                }
                PublishState::Failed { attempts, last_failure } => {
                    stage_error!(
                        Stage::Publish,
                        "❌ Giving up on {} after {} attempt(s): {}",
                        destination,
                        attempts,
                        last_failure
                    );
                    return Err(CompletionsError::PublishError {
                        destination: destination.to_string(),
                        attempts,
                        reason: last_failure,
                    });
                }
            };
        }
    }

    /// Make one attempt and return the next state
    async fn attempt(
        &self,
        attempt: u32,
        previous: Option<&PublishFailure>,
        table: &CompletionTable,
        destination: &DatasetDestination,
    ) -> PublishState {
        if let Some(failure) = previous {
            stage_debug!(
                Stage::Publish,
                "Attempt {}/{} after: {}",
                attempt,
                self.policy.max_attempts,
                failure
            );
        } else {
            stage_debug!(Stage::Publish, "Attempt {}/{}", attempt, self.policy.max_attempts);
        }

        let failure = match self.hub.push(table, destination).await {
            Ok(()) => return PublishState::Succeeded { attempts: attempt },
            Err(failure) => failure,
        };

        if !failure.is_retryable() {
            stage_error!(Stage::Publish, "🚫 Non-retryable failure on attempt {}: {}", attempt, failure);
            return PublishState::Failed {
                attempts: attempt,
                last_failure: failure,
            };
        }

        if attempt >= self.policy.max_attempts {
            return PublishState::Failed {
                attempts: attempt,
                last_failure: failure,
            };
        }

        let delay = self.policy.delay_after(attempt);
        stage_warn!(
            Stage::Publish,
            "⏳ Attempt {} failed ({}), retrying in {}ms",
            attempt,
            failure,
            delay.as_millis()
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        PublishState::Attempting {
            attempt: attempt + 1,
            last_failure: Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use tokio::time::Instant;
    use crate::traits::MockHubPublisher;

    /// Fails with a numbered server error `failures` times, then succeeds
    struct FlakyHub {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyHub {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HubPublisher for FlakyHub {
        async fn push(&self, _table: &CompletionTable, _destination: &DatasetDestination) -> Result<(), PublishFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(PublishFailure::ServerError(format!("failure {call}")))
            } else {
                Ok(())
            }
        }
    }

    fn destination() -> DatasetDestination {
        DatasetDestination::new("org/tldr-model-completions", "test").unwrap()
    }

    fn table() -> CompletionTable {
        CompletionTable::from_columns(
            vec!["p".to_string()],
            vec!["b".to_string()],
            vec!["f".to_string()],
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_n_failures() {
        for failures in 0..4 {
            let hub = Arc::new(FlakyHub::new(failures));
            let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::fixed(5, Duration::from_secs(10)));

            let report = publisher.publish(&table(), &destination()).await.unwrap();

            assert_eq!(report.attempts, failures + 1);
            assert_eq!(report.rows, 1);
            assert_eq!(hub.calls(), failures + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_surfaces_last_error() {
        let hub = Arc::new(FlakyHub::new(u32::MAX));
        let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::fixed(3, Duration::from_secs(1)));

        let err = publisher.publish(&table(), &destination()).await.unwrap_err();

        assert_eq!(hub.calls(), 3);
        match err {
            CompletionsError::PublishError { attempts, reason, destination } => {
                assert_eq!(attempts, 3);
                assert_eq!(reason, PublishFailure::ServerError("failure 3".to_string()));
                assert_eq!(destination, "org/tldr-model-completions:test");
            }
            other => panic!("Expected PublishError, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts_only() {
        let hub = Arc::new(FlakyHub::new(2));
        let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::fixed(5, Duration::from_secs(10)));

        let started = Instant::now();
        publisher.publish(&table(), &destination()).await.unwrap();

        // Two failures, two sleeps; none after the success
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sleep_after_final_attempt() {
        let hub = Arc::new(FlakyHub::new(u32::MAX));
        let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::fixed(2, Duration::from_secs(7)));

        let started = Instant::now();
        assert!(publisher.publish(&table(), &destination()).await.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_backoff_delays() {
        let hub = Arc::new(FlakyHub::new(3));
        let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::exponential(4, Duration::from_secs(1)));

        let started = Instant::now();
        let report = publisher.publish(&table(), &destination()).await.unwrap();

        assert_eq!(report.attempts, 4);
        // 1s + 2s + 4s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_zero_delay_changes_only_timing() {
        for (failures, max_attempts, expect_ok) in [(2, 3, true), (3, 3, false), (0, 1, true)] {
            let hub = Arc::new(FlakyHub::new(failures));
            let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::fixed(max_attempts, Duration::ZERO));

            let result = publisher.publish(&table(), &destination()).await;

            assert_eq!(result.is_ok(), expect_ok);
            assert_eq!(hub.calls(), failures.min(max_attempts - 1) + 1);
        }
    }

    #[tokio::test]
    async fn test_retry_state_carries_previous_failure() {
        let hub = Arc::new(FlakyHub::new(2));
        let publisher = RetryingPublisher::new(Arc::clone(&hub), RetryPolicy::fixed(3, Duration::ZERO));

        let first = publisher.attempt(1, None, &table(), &destination()).await;
        assert_eq!(
            first,
            PublishState::Attempting {
                attempt: 2,
                last_failure: Some(PublishFailure::ServerError("failure 1".to_string())),
            }
        );

        let previous = PublishFailure::ServerError("failure 1".to_string());
        let second = publisher.attempt(2, Some(&previous), &table(), &destination()).await;
        assert_eq!(
            second,
            PublishState::Attempting {
                attempt: 3,
                last_failure: Some(PublishFailure::ServerError("failure 2".to_string())),
            }
        );

        let third = publisher.attempt(3, Some(&previous), &table(), &destination()).await;
        assert_eq!(third, PublishState::Succeeded { attempts: 3 });
    }

    #[tokio::test]
    async fn test_permanent_failure_fails_fast() {
        let mut hub = MockHubPublisher::new();
        hub.expect_push()
            .times(1)
            .returning(|_, _| Err(PublishFailure::AuthenticationFailed));

        let publisher = RetryingPublisher::new(Arc::new(hub), RetryPolicy::fixed(5, Duration::from_secs(60)));
        let err = publisher.publish(&table(), &destination()).await.unwrap_err();

        assert_eq!(err.publish_failure(), Some(&PublishFailure::AuthenticationFailed));
        assert!(matches!(err, CompletionsError::PublishError { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_zero_attempts_is_config_error() {
        let mut hub = MockHubPublisher::new();
        hub.expect_push().never();

        let publisher = RetryingPublisher::new(Arc::new(hub), RetryPolicy::fixed(0, Duration::ZERO));
        let result = publisher.publish(&table(), &destination()).await;
        assert!(matches!(result, Err(CompletionsError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn test_pushes_same_table_and_destination_each_attempt() {
        let expected_table = table();
        let expected_destination = destination();
        let mut hub = MockHubPublisher::new();
        let mut calls = 0;
        hub.expect_push()
            .times(2)
            .withf(move |t, d| t == &expected_table && d == &expected_destination)
            .returning(move |_, _| {
                calls += 1;
                if calls == 1 {
                    Err(PublishFailure::RateLimitExceeded)
                } else {
                    Ok(())
                }
            });

        let publisher = RetryingPublisher::new(Arc::new(hub), RetryPolicy::fixed(3, Duration::ZERO));
        let report = publisher.publish(&table(), &destination()).await.unwrap();
        assert_eq!(report.attempts, 2);
    }
}
