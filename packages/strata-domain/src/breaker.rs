//! Per-tier failure isolation.
//!
//! A breaker starts `Closed`. Reaching `failure_threshold` consecutive failures opens it.
//! Once `recovery_timeout` has passed since the last failure, the next request is admitted
//! and the breaker moves to `HalfOpen`; that request's outcome either closes the breaker or
//! re-opens it.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
	Closed,
	Open,
	HalfOpen,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
	Opened,
	HalfOpened,
	Closed,
	Reopened,
}

#[derive(Clone, Debug, Serialize)]
pub struct BreakerSnapshot {
	pub state: BreakerState,
	pub failure_count: u32,
	pub trips: u64,
	pub millis_since_last_failure: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct CircuitBreaker {
	state: BreakerState,
	failure_count: u32,
	last_failure_at: Option<Instant>,
	half_open_since: Option<Instant>,
	failure_threshold: u32,
	recovery_timeout: Duration,
	trips: u64,
}
impl CircuitBreaker {
	pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
		Self {
			state: BreakerState::Closed,
			failure_count: 0,
			last_failure_at: None,
			half_open_since: None,
			failure_threshold: failure_threshold.max(1),
			recovery_timeout,
			trips: 0,
		}
	}

	pub fn state(&self) -> BreakerState {
		self.state
	}

	pub fn failure_count(&self) -> u32 {
		self.failure_count
	}

	pub fn trips(&self) -> u64 {
		self.trips
	}

	/// Decides admission for one request at `now`, moving `Open` to `HalfOpen` when the
	/// recovery timeout has elapsed.
	///
	/// A half-open breaker admits nothing else until its trial request reports back. If the
	/// trial never reports within another recovery timeout, a new trial is admitted.
	pub fn should_allow_request(&mut self, now: Instant) -> (bool, Option<Transition>) {
		match self.state {
			BreakerState::Closed => (true, None),
			BreakerState::Open => {
				if self.recovery_elapsed(self.last_failure_at, now) {
					self.state = BreakerState::HalfOpen;
					self.half_open_since = Some(now);

					(true, Some(Transition::HalfOpened))
				} else {
					(false, None)
				}
			},
			BreakerState::HalfOpen => {
				if self.recovery_elapsed(self.half_open_since, now) {
					self.half_open_since = Some(now);

					(true, None)
				} else {
					(false, None)
				}
			},
		}
	}

	/// Admission check that never changes state.
	pub fn would_allow(&self, now: Instant) -> bool {
		match self.state {
			BreakerState::Closed => true,
			BreakerState::Open => self.recovery_elapsed(self.last_failure_at, now),
			BreakerState::HalfOpen => self.recovery_elapsed(self.half_open_since, now),
		}
	}

	/// An open breaker ignores successes; only a half-open trial can close it.
	pub fn record_success(&mut self) -> Option<Transition> {
		match self.state {
			BreakerState::Closed => {
				self.failure_count = 0;

				None
			},
			BreakerState::Open => None,
			BreakerState::HalfOpen => {
				self.failure_count = 0;
				self.state = BreakerState::Closed;
				self.half_open_since = None;

				Some(Transition::Closed)
			},
		}
	}

	pub fn record_failure(&mut self, now: Instant) -> Option<Transition> {
		self.failure_count = self.failure_count.saturating_add(1);
		self.last_failure_at = Some(now);

		match self.state {
			BreakerState::Closed if self.failure_count >= self.failure_threshold => {
				self.state = BreakerState::Open;
				self.trips += 1;

				Some(Transition::Opened)
			},
			BreakerState::Closed | BreakerState::Open => None,
			BreakerState::HalfOpen => {
				self.state = BreakerState::Open;
				self.half_open_since = None;
				self.trips += 1;

				Some(Transition::Reopened)
			},
		}
	}

	pub fn snapshot(&self, now: Instant) -> BreakerSnapshot {
		BreakerSnapshot {
			state: self.state,
			failure_count: self.failure_count,
			trips: self.trips,
			millis_since_last_failure: self
				.last_failure_at
				.map(|at| now.saturating_duration_since(at).as_millis() as u64),
		}
	}

	fn recovery_elapsed(&self, since: Option<Instant>, now: Instant) -> bool {
		since.map(|at| now.saturating_duration_since(at) >= self.recovery_timeout).unwrap_or(true)
	}
}
impl Default for CircuitBreaker {
	fn default() -> Self {
		Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tripped(now: Instant) -> CircuitBreaker {
		let mut breaker = CircuitBreaker::new(3, Duration::from_secs(10));

		for _ in 0..3 {
			breaker.record_failure(now);
		}

		breaker
	}

	#[test]
	fn opens_at_threshold() {
		let now = Instant::now();
		let mut breaker = CircuitBreaker::new(3, Duration::from_secs(10));

		assert_eq!(breaker.record_failure(now), None);
		assert_eq!(breaker.record_failure(now), None);
		assert_eq!(breaker.record_failure(now), Some(Transition::Opened));
		assert_eq!(breaker.state(), BreakerState::Open);
		assert_eq!(breaker.trips(), 1);
	}

	#[test]
	fn any_failure_run_past_threshold_stays_open() {
		let now = Instant::now();

		for extra in 0..8 {
			let mut breaker = tripped(now);

			for _ in 0..extra {
				breaker.record_failure(now);
			}

			assert_eq!(breaker.state(), BreakerState::Open);
		}
	}

	#[test]
	fn success_resets_failure_run_while_closed() {
		let now = Instant::now();
		let mut breaker = CircuitBreaker::new(3, Duration::from_secs(10));

		breaker.record_failure(now);
		breaker.record_failure(now);
		breaker.record_success();
		breaker.record_failure(now);

		assert_eq!(breaker.state(), BreakerState::Closed);
		assert_eq!(breaker.failure_count(), 1);
	}

	#[test]
	fn rejects_until_recovery_timeout() {
		let now = Instant::now();
		let mut breaker = tripped(now);

		assert_eq!(breaker.should_allow_request(now + Duration::from_secs(9)), (false, None));
		assert_eq!(
			breaker.should_allow_request(now + Duration::from_secs(10)),
			(true, Some(Transition::HalfOpened))
		);
		assert_eq!(breaker.state(), BreakerState::HalfOpen);
	}

	#[test]
	fn half_open_admits_a_single_trial() {
		let now = Instant::now();
		let mut breaker = tripped(now);
		let later = now + Duration::from_secs(11);

		assert!(breaker.should_allow_request(later).0);
		assert!(!breaker.should_allow_request(later).0);
		assert!(!breaker.would_allow(later + Duration::from_secs(1)));
	}

	#[test]
	fn half_open_success_closes() {
		let now = Instant::now();
		let mut breaker = tripped(now);

		breaker.should_allow_request(now + Duration::from_secs(10));

		assert_eq!(breaker.record_success(), Some(Transition::Closed));
		assert_eq!(breaker.state(), BreakerState::Closed);
		assert_eq!(breaker.failure_count(), 0);
	}

	#[test]
	fn open_breaker_ignores_late_successes() {
		let now = Instant::now();
		let mut breaker = tripped(now);

		assert_eq!(breaker.record_success(), None);
		assert_eq!(breaker.state(), BreakerState::Open);
		assert_eq!(breaker.failure_count(), 3);
		assert!(!breaker.would_allow(now + Duration::from_secs(1)));
	}

	#[test]
	fn half_open_failure_reopens_and_refreshes_clock() {
		let now = Instant::now();
		let mut breaker = tripped(now);
		let trial_at = now + Duration::from_secs(10);

		breaker.should_allow_request(trial_at);

		assert_eq!(breaker.record_failure(trial_at), Some(Transition::Reopened));
		assert_eq!(breaker.state(), BreakerState::Open);
		assert!(!breaker.would_allow(trial_at + Duration::from_secs(9)));
		assert!(breaker.would_allow(trial_at + Duration::from_secs(10)));
	}

	#[test]
	fn lost_trial_is_replaced_after_another_timeout() {
		let now = Instant::now();
		let mut breaker = tripped(now);

		breaker.should_allow_request(now + Duration::from_secs(10));

		assert!(breaker.should_allow_request(now + Duration::from_secs(20)).0);
		assert_eq!(breaker.state(), BreakerState::HalfOpen);
	}
}
