use std::time::Duration;

/// Backoff schedule for CRM calls.
///
/// A call makes at most `max_attempts` attempts. A failed attempt *n*
/// (0-based) is followed by a `min(base_delay * 2^n, max_delay)` pause,
/// except after the final attempt, which fails the call without sleeping.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(6),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_schedule_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<f64> = (0..5)
            .map(|n| policy.delay_after(n).as_secs_f64())
            .collect();
        assert_eq!(delays, vec![0.5, 1.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(40), Duration::from_secs(6));
    }
}
