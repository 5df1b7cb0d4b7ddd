use std::time::Duration;

use governor::{
    Quota,
    clock::Clock,
    state::{InMemoryState, NotKeyed},
};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::einvoice::EinvoiceApiError;

const WINDOW: Duration = Duration::from_secs(60);

/// Governor clock driven by tokio's timer, so paused test time applies.
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        Instant::now().into_std()
    }
}

type DirectLimiter = governor::RateLimiter<
    NotKeyed,
    InMemoryState,
    TokioClock,
    governor::middleware::NoOpMiddleware<std::time::Instant>,
>;

/// The limiter for the quota currently configured.
struct Current {
    limit: u32,
    limiter: DirectLimiter,
}

/// GCRA limiter shared by every outbound e-invoice call.
///
/// A quota of `limit` calls per window is enforced as one call every
/// `window / limit`, with no burst, so no rolling window ever holds more than
/// `limit` calls. The lock doubles as a turnstile: tokio's mutex wakes waiters
/// in FIFO order and the holder sleeps inside it until its cell conforms.
pub struct RateLimiter {
    window: Duration,
    current: Mutex<Option<Current>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_window(WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            current: Mutex::new(None),
        }
    }

    /// Waits until a call fits `limit` calls per window.
    ///
    /// `limit == 0` disables throttling. Fails with `RateLimitExceeded` when
    /// the slot would not free up within `max_wait`. A changed `limit` starts
    /// a fresh quota.
    pub async fn acquire_slot(
        &self,
        limit: u32,
        max_wait: Duration,
    ) -> Result<(), EinvoiceApiError> {
        if limit == 0 {
            return Ok(());
        }
        let Some(quota) = Quota::with_period(self.window / limit) else {
            return Ok(());
        };
        let deadline = Instant::now() + max_wait;
        let mut slot = tokio::time::timeout_at(deadline, self.current.lock())
            .await
            .map_err(|_| EinvoiceApiError::RateLimitExceeded)?;

        if slot.as_ref().is_some_and(|c| c.limit != limit) {
            *slot = None;
        }
        let current = slot.get_or_insert_with(|| {
            tracing::debug!(limit, "outbound rate limit quota built");
            Current {
                limit,
                limiter: governor::RateLimiter::direct_with_clock(quota, &TokioClock),
            }
        });

        loop {
            let not_until = match current.limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => not_until,
            };
            let free_at = Instant::now() + not_until.wait_time_from(TokioClock.now());
            if free_at > deadline {
                tracing::warn!(limit, "outbound rate limit wait ceiling exceeded");
                return Err(EinvoiceApiError::RateLimitExceeded);
            }
            tokio::time::sleep_until(free_at).await;
        }
    }
}
