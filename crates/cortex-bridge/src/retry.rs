//! # Retry Policies
//!
//! Fixed-delay retry for operations that can race a headset that is still
//! settling. Exactly one condition is retried: the server reporting the
//! device as busy / not ready ([`CortexError::is_device_busy`]). Every other
//! error aborts the loop on the attempt that produced it.
//!
//! ## Predefined Policies
//!
//! | Policy | Attempts | Delay | Use Case |
//! |--------|----------|-------|----------|
//! | [`RetryPolicy::session()`] | 12 | 1000 ms | `createSession` while the headset finishes connecting |
//! | [`RetryPolicy::subscribe()`] | 12 | 1000 ms | `subscribe` right after session creation |
//! | [`RetryPolicy::none()`] | 1 | none | Everything else |
//!
//! ## Usage
//!
//! ```rust
//! use cortex_bridge::retry::{RetryPolicy, with_retry};
//! use cortex_bridge::CortexError;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! let attempts = AtomicUsize::new(0);
//! let rt = tokio::runtime::Builder::new_current_thread()
//!     .enable_time()
//!     .build()
//!     .unwrap();
//!
//! let policy = RetryPolicy::fixed(3, Duration::from_millis(1));
//! let result = rt.block_on(async {
//!     with_retry(&policy, || {
//!         let attempt = attempts.fetch_add(1, Ordering::SeqCst);
//!         async move {
//!             if attempt == 0 {
//!                 Err(CortexError::from_api_error(-32152, "headset busy"))
//!             } else {
//!                 Ok::<_, CortexError>(42)
//!             }
//!         }
//!     })
//!     .await
//! });
//!
//! assert_eq!(result.unwrap(), 42);
//! ```

use std::time::Duration;

use crate::error::{CortexError, CortexResult};

/// Attempt budget and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `0` behaves like `1`.
    pub max_attempts: u32,
    /// Sleep between attempts. Constant; there is no backoff.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// 12 attempts, 1 s apart. Default for session creation.
    #[must_use]
    pub fn session() -> Self {
        Self::fixed(12, Duration::from_millis(1000))
    }

    /// 12 attempts, 1 s apart. Default for subscribe.
    #[must_use]
    pub fn subscribe() -> Self {
        Self::fixed(12, Duration::from_millis(1000))
    }

    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Execute an async operation under `policy`.
///
/// # Errors
/// Returns the first error that is not device-busy, unchanged. When every
/// attempt fails with device-busy, returns [`CortexError::RetryExhausted`]
/// wrapping the last one.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> CortexResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = CortexResult<T>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_device_busy() {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(CortexError::RetryExhausted {
                attempts: attempt,
                last_error: Box::new(err),
            });
        }

        tracing::warn!(
            attempt,
            max = max_attempts,
            error = %err,
            delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
            "Device busy, retrying"
        );

        tokio::time::sleep(policy.delay).await;
    }
}
