//! Exponential backoff with jitter.
//!
//! Attempts are numbered from 1. The delay inserted after attempt `n` fails is
//!
//! ```text
//! raw    = initial_delay * factor^(n - 1)
//! capped = min(raw, max_delay)
//! delay  = jitter(capped)
//! ```
//!
//! [`Jitter::Equal`] keeps the result in `[capped/2, capped)`: the worst case
//! is halved while independent clients still spread their retries out.

use std::time::Duration;

use rand::Rng;

/// Largest exponent fed to `powi`; beyond this every sane factor saturates the cap
const MAX_BACKOFF_EXPONENT: u32 = 64;

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Full jitter: 0 to calculated_delay
    Full,
    /// Equal jitter: calculated_delay/2 to calculated_delay
    #[default]
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay using the thread-local RNG
    pub fn apply(self, delay: Duration) -> Duration {
        self.apply_with_rng(delay, &mut rand::thread_rng())
    }

    /// Apply jitter to the calculated delay using `rng`
    pub fn apply_with_rng<R: Rng + ?Sized>(self, delay: Duration, rng: &mut R) -> Duration {
        let secs = delay.as_secs_f64();
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_secs_f64(uniform(rng, secs)),
            Jitter::Equal => {
                let half = secs / 2.0;
                Duration::from_secs_f64(half + uniform(rng, half))
            }
        }
    }
}

/// Uniform sample in `[0, upper)`, or 0 for an empty range
fn uniform<R: Rng + ?Sized>(rng: &mut R, upper: f64) -> f64 {
    if upper > 0.0 {
        rng.gen_range(0.0..upper)
    } else {
        0.0
    }
}

/// Exponential backoff calculator.
///
/// Pure apart from the random source consumed by jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    factor: f64,
    max_delay: Duration,
    jitter: Jitter,
}

impl ExponentialBackoff {
    /// Create a calculator with equal jitter.
    ///
    /// A factor below 1.0 or non-finite is treated as 1.0 (constant delay).
    pub fn new(initial_delay: Duration, factor: f64, max_delay: Duration) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
        Self { initial_delay, factor, max_delay, jitter: Jitter::Equal }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Delay before jitter for the 1-based `attempt` that just failed.
    ///
    /// `attempt = 0` is treated as 1.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let max_secs = self.max_delay.as_secs_f64();
        let raw = self.initial_delay.as_secs_f64() * self.factor.powi(exponent as i32);

        if !raw.is_finite() || raw >= max_secs {
            self.max_delay
        } else {
            Duration::from_secs_f64(raw)
        }
    }

    /// Jittered delay for the 1-based `attempt` that just failed
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Jittered delay drawing randomness from `rng`
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.jitter.apply_with_rng(self.capped_delay(attempt), rng)
    }
}
