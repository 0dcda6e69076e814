use std::time::Duration;

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.5;

/// Reconnect delay state. A value type: every transition returns a new state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffState {
    current: Duration,
    min: Duration,
    max: Duration,
    growth_factor: f64,
}

impl BackoffState {
    pub fn new(min: Duration, max: Duration, growth_factor: f64) -> Result<Self, String> {
        if min > max {
            return Err(format!(
                "minimum delay {} ms exceeds maximum delay {} ms",
                min.as_millis(),
                max.as_millis()
            ));
        }
        if !growth_factor.is_finite() || growth_factor < 1.0 {
            return Err(format!(
                "growth factor must be a finite number >= 1.0, got {growth_factor}"
            ));
        }
        Ok(Self {
            current: min,
            min,
            max,
            growth_factor,
        })
    }

    /// Delay to wait before the next attempt.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Grows the delay by the growth factor, capped at `max`.
    pub fn next(self) -> (Duration, Self) {
        let grown = self.current.as_secs_f64() * self.growth_factor;
        let delay = if grown >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(grown).min(self.max)
        };
        (
            delay,
            Self {
                current: delay,
                ..self
            },
        )
    }

    pub fn reset(self) -> Self {
        Self {
            current: self.min,
            ..self
        }
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self {
            current: DEFAULT_MIN_DELAY,
            min: DEFAULT_MIN_DELAY,
            max: DEFAULT_MAX_DELAY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}
