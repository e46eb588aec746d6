//! Exponential backoff used when re-opening the serial port.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Default base delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_millis(500);
/// Default ceiling for reconnect delays.
pub const DEFAULT_RECONNECT_CAP: Duration = Duration::from_secs(10);
/// Default duration of healthy reads that resets the backoff window.
pub const DEFAULT_RECONNECT_RESET: Duration = Duration::from_secs(30);

const MIN_SLEEP_MS: u64 = 10;

/// Exponential backoff policy for reconnect attempts.
///
/// A `deadline` of `None` retries forever.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub reset_after: Duration,
    pub deadline: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_RECONNECT_BASE,
            cap: DEFAULT_RECONNECT_CAP,
            reset_after: DEFAULT_RECONNECT_RESET,
            deadline: None,
        }
    }
}

/// Tracks reconnect attempts and produces jittered delays.
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    failure_since: Option<Instant>,
    recovered_at: Option<Instant>,
    rng: StdRng,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            failure_since: None,
            recovered_at: None,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Record that the port was opened again.
    pub fn record_success(&mut self, now: Instant) {
        if self.failure_since.is_some() {
            self.recovered_at = Some(now);
        }
    }

    /// Reset the window once the link has stayed healthy for `reset_after`.
    pub fn record_healthy(&mut self, now: Instant) {
        if let Some(recovered) = self.recovered_at
            && now.duration_since(recovered) >= self.policy.reset_after
        {
            self.current = self.policy.base;
            self.failure_since = None;
            self.recovered_at = None;
        }
    }

    /// Whether a failure window is currently open.
    pub fn is_failing(&self) -> bool {
        self.failure_since.is_some()
    }

    /// Calculate the next jittered sleep following a failure.
    ///
    /// Returns `None` once the configured deadline has passed.
    pub fn next_sleep(&mut self, now: Instant) -> Option<Duration> {
        let start = *self.failure_since.get_or_insert(now);
        self.recovered_at = None;

        if let Some(deadline) = self.policy.deadline
            && now.duration_since(start) >= deadline
        {
            return None;
        }

        if now != start {
            self.current = self.current.saturating_mul(2).min(self.policy.cap);
        }

        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep_ms = match max_ms {
            0 => MIN_SLEEP_MS,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        Some(Duration::from_millis(sleep_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(deadline: Option<Duration>) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(400),
            reset_after: Duration::from_secs(1),
            deadline,
        }
    }

    #[test]
    fn first_delay_is_bounded_by_base() {
        let mut state = BackoffState::new(policy(None));
        let delay = state.next_sleep(Instant::now()).expect("delay");
        assert!(delay <= Duration::from_millis(100));
        assert!(delay >= Duration::from_millis(MIN_SLEEP_MS));
        assert!(state.is_failing());
    }

    #[test]
    fn delays_never_exceed_cap() {
        let mut state = BackoffState::new(policy(None));
        let start = Instant::now();
        for step in 0..10u64 {
            let now = start + Duration::from_millis(step * 50);
            let delay = state.next_sleep(now).expect("no deadline");
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn deadline_stops_retries() {
        let mut state = BackoffState::new(policy(Some(Duration::from_secs(2))));
        let start = Instant::now();
        assert!(state.next_sleep(start).is_some());
        assert!(state.next_sleep(start + Duration::from_secs(1)).is_some());
        assert!(state.next_sleep(start + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn healthy_period_resets_window() {
        let mut state = BackoffState::new(policy(Some(Duration::from_secs(2))));
        let start = Instant::now();
        state.next_sleep(start);
        state.record_success(start + Duration::from_millis(100));
        state.record_healthy(start + Duration::from_millis(1_200));
        assert!(!state.is_failing());
        // A new failure window starts from scratch, so the old deadline no longer applies.
        assert!(state.next_sleep(start + Duration::from_secs(5)).is_some());
    }

    #[test]
    fn failing_again_before_reset_keeps_window() {
        let mut state = BackoffState::new(policy(None));
        let start = Instant::now();
        state.next_sleep(start);
        state.record_success(start + Duration::from_millis(100));
        state.next_sleep(start + Duration::from_millis(200));
        state.record_healthy(start + Duration::from_secs(10));
        assert!(state.is_failing());
    }
}
