// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bounded retry of transient control-plane failures
//!
//! Only [`ControlPlaneError::is_transient`] errors are retried. Anything else
//! is returned after the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::control_plane::ControlPlaneError;
use crate::domain::ResourceId;
use crate::errors::ProvisioningError;

/// Attempt ceiling and exponential backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_attempts` times without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`: `base * 2^(attempt-1)`, capped
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Final error of a retried call and how many attempts were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub error: ControlPlaneError,
    pub attempts: u32,
}

impl RetryFailure {
    /// Classify into the provisioning taxonomy for `resource`
    pub fn into_provisioning(self, resource: &ResourceId, operation: &str) -> ProvisioningError {
        if self.error.is_transient() {
            ProvisioningError::ControlPlaneTransient {
                resource: resource.clone(),
                operation: operation.to_string(),
                attempts: self.attempts,
                message: self.error.to_string(),
            }
        } else {
            ProvisioningError::ControlPlaneRejected {
                resource: resource.clone(),
                operation: operation.to_string(),
                reason: self.error.to_string(),
            }
        }
    }
}

/// Run `call` until it succeeds, fails terminally, or the policy runs out
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ControlPlaneError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient control plane failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                return Err(RetryFailure {
                    error,
                    attempts: attempt,
                })
            }
        }
    }
}

/// [`retry_transient`] with the failure classified for `resource`
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    resource: &ResourceId,
    operation: &str,
    call: F,
) -> Result<T, ProvisioningError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ControlPlaneError>>,
{
    retry_transient(policy, operation, call)
        .await
        .map_err(|failure| failure.into_provisioning(resource, operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(300),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(50));
        assert_eq!(policy.delay_after(2), Duration::from_millis(100));
        assert_eq!(policy.delay_after(3), Duration::from_millis(200));
        assert_eq!(policy.delay_after(4), Duration::from_millis(300));
        assert_eq!(policy.delay_after(64), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_transient(&RetryPolicy::immediate(3), "op", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ControlPlaneError::Throttled("slow down".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempt_ceiling() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(&RetryPolicy::immediate(2), "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ControlPlaneError::Transient("reset".into()))
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(matches!(
            failure.into_provisioning(&ResourceId::new("x"), "op"),
            ProvisioningError::ControlPlaneTransient { attempts: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_transient(&RetryPolicy::immediate(5), "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ControlPlaneError::AccessDenied("s3:GetObject".into()))
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
