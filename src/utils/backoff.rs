use std::time::Duration;

use rand::Rng;

/// Exponential retry delay. Grows by `factor` per consecutive failure, is
/// clamped to `[min, max]` and never shrinks until [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
    attempt: u32,
    last: Duration,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            factor: 2.0,
            jitter: true,
            attempt: 0,
            last: Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    #[cfg(test)]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay();
        let delay = if self.jitter {
            // Jitter only trims the delay; the floor below keeps it monotonic.
            base.mul_f64(rand::thread_rng().gen_range(0.75..=1.0))
        } else {
            base
        };
        let delay = delay.max(self.last).clamp(self.min, self.max);

        self.attempt = self.attempt.saturating_add(1);
        self.last = delay;
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last = Duration::ZERO;
    }

    fn base_delay(&self) -> Duration {
        let exponent = self.attempt.min(63) as i32;
        let secs = self.min.as_secs_f64() * self.factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
