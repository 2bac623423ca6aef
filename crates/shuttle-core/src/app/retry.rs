//! Retry policy and the coordinator that applies it.
//!
//! Two independent policies run through the same coordinator: the whole
//! upload attempt (resolve → upload → parse) and the annotation report call.
//! Retryability comes from `ArtifactError::kind()`, so the security error and
//! cancellation stop the loop immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::{ArtifactError, AttemptId, AttemptRecord, DecisionRecord, ErrorKind};
use crate::ports::{Clock, IdGenerator};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Two attempts, 100ms before the retry.
    pub fn two_attempts() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 100,
            multiplier: 2.0,
        }
    }

    /// Same attempt budget with no waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Delay before the next try, after `attempts` tries have failed.
    ///
    /// delay = base_delay * multiplier^(attempts - 1), saturating at `Duration::MAX`
    pub fn next_delay(&self, attempts: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let base_secs = Duration::from_millis(self.base_delay_ms).as_secs_f64();
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::two_attempts()
    }
}

/// Everything a retried run produced: the final result plus its history.
#[derive(Debug)]
pub struct Retried<T> {
    pub result: Result<T, ArtifactError>,
    pub attempts: Vec<AttemptRecord>,
    pub decisions: Vec<DecisionRecord>,
}

/// Runs an operation under a `RetryPolicy`, cooperating with cancellation.
pub struct RetryCoordinator<'a> {
    name: &'static str,
    policy: &'a RetryPolicy,
    clock: &'a dyn Clock,
    ids: &'a dyn IdGenerator,
    cancel: &'a CancellationToken,
}

impl<'a> RetryCoordinator<'a> {
    pub fn new(
        name: &'static str,
        policy: &'a RetryPolicy,
        clock: &'a dyn Clock,
        ids: &'a dyn IdGenerator,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            name,
            policy,
            clock,
            ids,
            cancel,
        }
    }

    /// Calls `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget runs out. Only the last error is returned.
    ///
    /// `on_retry` runs after a failed attempt that will be retried, before the
    /// backoff delay.
    pub async fn run<T, F, Fut, H>(&self, mut op: F, mut on_retry: H) -> Retried<T>
    where
        F: FnMut(AttemptId, u32) -> Fut,
        Fut: Future<Output = Result<T, ArtifactError>>,
        H: FnMut(u32, &ArtifactError),
    {
        let mut attempts = Vec::new();
        let mut decisions = Vec::new();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut number = 0;

        loop {
            number += 1;
            if self.cancel.is_cancelled() {
                return Retried {
                    result: Err(ArtifactError::Cancelled),
                    attempts,
                    decisions,
                };
            }

            let attempt_id = self.ids.generate_attempt_id();
            let started_at = self.clock.now();
            let result = op(attempt_id, number).await;
            attempts.push(AttemptRecord {
                attempt_id,
                policy: self.name.to_string(),
                number,
                error: result.as_ref().err().map(ToString::to_string),
                started_at,
                completed_at: self.clock.now(),
            });

            let err = match result {
                Ok(value) => {
                    return Retried {
                        result: Ok(value),
                        attempts,
                        decisions,
                    };
                }
                Err(err) => err,
            };

            let trigger = serde_json::json!({
                "error": err.to_string(),
                "attempt": number,
                "max_attempts": max_attempts,
            });

            match err.kind() {
                ErrorKind::Cancelled => {}
                ErrorKind::Permanent => {
                    tracing::warn!(policy = self.name, attempt = number, error = %err, "non-retryable failure");
                    decisions.push(self.decide(trigger, "terminal"));
                }
                ErrorKind::Transient if number >= max_attempts => {
                    tracing::warn!(policy = self.name, attempt = number, error = %err, "attempt budget exhausted");
                    decisions.push(self.decide(trigger, "give_up"));
                }
                ErrorKind::Transient => {
                    let delay = self.policy.next_delay(number);
                    tracing::info!(
                        policy = self.name,
                        attempt = number,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying"
                    );
                    decisions.push(self.decide(trigger, "retry"));
                    on_retry(number, &err);

                    if !delay.is_zero() {
                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                return Retried {
                                    result: Err(ArtifactError::Cancelled),
                                    attempts,
                                    decisions,
                                };
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    continue;
                }
            }

            return Retried {
                result: Err(err),
                attempts,
                decisions,
            };
        }
    }

    fn decide(&self, trigger: serde_json::Value, decision: &str) -> DecisionRecord {
        DecisionRecord::new(trigger, self.name, decision, self.clock.now())
    }
}
