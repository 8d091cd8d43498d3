//! Reconnect delays for tunnel workers

use std::time::Duration;

use rand::Rng;

/// Delay schedule growing by `multiplier` per failed attempt, capped at `max`
///
/// Each delay is stretched by up to `jitter` of itself so workers of one
/// tunnel do not reconnect in lockstep.
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.multiplier.powi(self.attempt as i32);
        let base = self.initial.mul_f64(factor).min(self.max);
        // Past the cap the exponent no longer matters
        if base < self.max {
            self.attempt += 1;
        }

        if self.jitter == 0.0 {
            return base;
        }
        let stretch = rand::thread_rng().gen_range(0.0..=self.jitter);
        base + base.mul_f64(stretch)
    }

    /// Start over after a connection that carried traffic
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30), 2.0, 0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_increases_and_caps() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4), 2.0, 0.0);

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_bounded() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(2), Duration::from_secs(60), 2.0, 0.5);
        for expected in [2, 4, 8] {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(expected));
            assert!(delay <= Duration::from_secs(expected).mul_f64(1.5));
        }
    }
}
