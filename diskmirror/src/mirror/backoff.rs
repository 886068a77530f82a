use std::time::Duration;

use rand::Rng;

/// Exponential delay schedule. With jitter, each delay lands in the upper
/// half of its exponential step, so retries never fire back to back.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self { base, max, jitter }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay, false)
    }

    /// Upper bound for the delay after failed attempt `attempt`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(20);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis().min(u128::from(u64::MAX)) as u64;
        half + Duration::from_millis(rng.gen_range(0..=spread))
    }
}

/// How many times a transient remote query is re-issued, and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Backoff) -> Self {
        Self { retries, backoff }
    }

    pub fn none() -> Self {
        Self::new(0, Backoff::fixed(Duration::ZERO))
    }

    /// Whether a failed attempt number `attempt` (0-based) may be followed by another.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.retries
    }

    pub async fn pause(&self, attempt: u32) {
        let delay = self
            .backoff
            .delay_with_rng(attempt, &mut rand::thread_rng());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
