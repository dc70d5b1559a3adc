use std::time::Duration;

use serde::Serialize;

pub const EMA_ALPHA: f64 = 0.1;
pub const QUALITY_MIN: f64 = 0.1;
pub const QUALITY_MAX: f64 = 1.0;
pub const QUALITY_RECOVERY_STEP: f64 = 0.1;
pub const QUALITY_PENALTY_STEP: f64 = 0.2;

/// Smoothed per-tier health signal.
///
/// Probes drive `available` and `quality`. Request outcomes only feed the latency and error
/// averages and the consecutive failure counter.
#[derive(Clone, Debug, Serialize)]
pub struct TierHealth {
	pub available: bool,
	pub response_time_ms: f64,
	pub error_rate: f64,
	pub quality: f64,
	pub consecutive_failures: u32,
	pub probes: u64,
	samples: u64,
}
impl TierHealth {
	pub fn new() -> Self {
		Self {
			available: true,
			response_time_ms: 0.0,
			error_rate: 0.0,
			quality: QUALITY_MAX,
			consecutive_failures: 0,
			probes: 0,
			samples: 0,
		}
	}

	pub fn record_probe_success(&mut self, elapsed: Duration, available: bool) {
		self.probes += 1;
		self.available = available;
		self.consecutive_failures = 0;
		self.quality = (self.quality + QUALITY_RECOVERY_STEP).min(QUALITY_MAX);

		self.observe(elapsed, false);
	}

	pub fn record_probe_failure(&mut self, elapsed: Duration) {
		self.probes += 1;
		self.available = false;
		self.consecutive_failures = self.consecutive_failures.saturating_add(1);
		self.quality = (self.quality - QUALITY_PENALTY_STEP).max(QUALITY_MIN);

		self.observe(elapsed, true);
	}

	pub fn record_operation(&mut self, elapsed: Duration, failed: bool) {
		if failed {
			self.consecutive_failures = self.consecutive_failures.saturating_add(1);
		} else {
			self.consecutive_failures = 0;
		}

		self.observe(elapsed, failed);
	}

	fn observe(&mut self, elapsed: Duration, failed: bool) {
		let millis = elapsed.as_secs_f64() * 1_000.0;
		let error = if failed { 1.0 } else { 0.0 };

		if self.samples == 0 {
			self.response_time_ms = millis;
			self.error_rate = error;
		} else {
			self.response_time_ms = ema(self.response_time_ms, millis);
			self.error_rate = ema(self.error_rate, error);
		}

		self.samples += 1;
	}
}
impl Default for TierHealth {
	fn default() -> Self {
		Self::new()
	}
}

pub fn ema(current: f64, sample: f64) -> f64 {
	EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * current
}
