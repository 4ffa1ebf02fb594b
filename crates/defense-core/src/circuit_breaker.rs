// Generic Closed/Open/HalfOpen circuit breaker for outbound dependencies
// (IP reputation, LLM classifier, external classifier API, community report
// endpoint, alert transports). One instance per dependency.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(not(test))]
const FAILURE_THRESHOLD: usize = 5;
#[cfg(test)]
const FAILURE_THRESHOLD: usize = 3; // Faster trip for tests

#[cfg(not(test))]
const RESET_TIMEOUT_MS: u64 = 30_000; // 30 seconds
#[cfg(test)]
const RESET_TIMEOUT_MS: u64 = 500; // Faster recovery for tests

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed = 0,   // Normal operation
    Open = 1,     // Tripped, failing fast
    HalfOpen = 2, // Recovering, allowing one test request
}

impl From<usize> for CircuitState {
    fn from(value: usize) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Trips after `FAILURE_THRESHOLD` consecutive failures, short-circuits calls
/// while open, and probes again after `RESET_TIMEOUT_MS`.
pub struct CircuitBreaker {
    state: AtomicUsize,
    failure_count: AtomicUsize,
    last_failure_time: AtomicU64,
}

impl CircuitBreaker {
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0), // Closed
            failure_count: AtomicUsize::new(0),
            last_failure_time: AtomicU64::new(0),
        }
    }

    /// Check if a request should be allowed to proceed.
    pub fn check_allow(&self) -> bool {
        let state = CircuitState::from(self.state.load(Ordering::Acquire));

        match state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = current_time_ms();
                let last_fail = self.last_failure_time.load(Ordering::Acquire);

                if now >= last_fail + RESET_TIMEOUT_MS {
                    // CompareExchange ensures only one caller transitions to HalfOpen.
                    self.state
                        .compare_exchange(
                            CircuitState::Open as usize,
                            CircuitState::HalfOpen as usize,
                            Ordering::SeqCst,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let state = CircuitState::from(self.state.load(Ordering::Acquire));
        match state {
            CircuitState::HalfOpen => self.reset_circuit(),
            CircuitState::Closed => self.failure_count.store(0, Ordering::Relaxed),
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let state = CircuitState::from(self.state.load(Ordering::Acquire));
        match state {
            CircuitState::Closed => {
                let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= FAILURE_THRESHOLD {
                    self.trip_circuit();
                }
            }
            CircuitState::HalfOpen => self.trip_circuit(),
            CircuitState::Open => {
                self.last_failure_time.store(current_time_ms(), Ordering::Release);
            }
        }
    }

    fn trip_circuit(&self) {
        self.state.store(CircuitState::Open as usize, Ordering::SeqCst);
        self.last_failure_time.store(current_time_ms(), Ordering::SeqCst);
    }

    fn reset_circuit(&self) {
        self.state.store(CircuitState::Closed as usize, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn set_state_for_test(&self, state: CircuitState) {
        self.state.store(state as usize, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn set_last_failure_for_test(&self, millis: u64) {
        self.last_failure_time.store(millis, Ordering::SeqCst);
    }

    pub fn get_state_name(&self) -> &'static str {
        match CircuitState::from(self.state.load(Ordering::Relaxed)) {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_and_recover_flow() {
        let cb = CircuitBreaker::new();
        assert_eq!(cb.get_state_name(), "Closed");

        for _ in 0..FAILURE_THRESHOLD {
            cb.record_failure();
        }
        assert_eq!(cb.get_state_name(), "Open");
        assert!(!cb.check_allow());

        let past = current_time_ms().saturating_sub(RESET_TIMEOUT_MS + 1);
        cb.set_last_failure_for_test(past);

        assert!(cb.check_allow());
        assert_eq!(cb.get_state_name(), "HalfOpen");

        cb.record_success();
        assert_eq!(cb.get_state_name(), "Closed");
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = CircuitBreaker::new();
        cb.set_state_for_test(CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.get_state_name(), "Open");
    }

    #[test]
    fn closed_failures_below_threshold_do_not_trip() {
        let cb = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            cb.record_failure();
        }
        assert_eq!(cb.get_state_name(), "Closed");
        assert!(cb.check_allow());
    }
}
