use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinSet};

use crate::router::MemoryRouter;

const TICK_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
	pub probed: usize,
	pub unavailable: usize,
	/// Probe tasks that did not complete normally.
	pub aborted: usize,
}

/// Probes every configured tier on a fixed cadence, off the request path.
pub struct HealthMonitor {
	router: Arc<MemoryRouter>,
	interval: Duration,
}
impl HealthMonitor {
	pub fn new(router: Arc<MemoryRouter>, interval: Duration) -> Self {
		Self { router, interval }
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// One probe per tier, concurrently. Probe failures are recorded, never raised.
	pub async fn tick(&self) -> TickSummary {
		let facade = Arc::clone(self.router.facade());
		let mut probes = JoinSet::new();
		let mut summary = TickSummary::default();

		for tier in facade.tiers() {
			let facade = Arc::clone(&facade);

			probes.spawn(async move { facade.probe(tier).await });
		}

		while let Some(joined) = probes.join_next().await {
			match joined {
				Ok(outcome) => {
					summary.probed += 1;

					if !matches!(outcome.result.as_ref(), Ok(report) if report.available) {
						summary.unavailable += 1;
					}

					self.router.record_probe(&outcome);
				},
				Err(err) => {
					summary.aborted += 1;

					tracing::warn!(error = %err, "Tier probe task aborted.");
				},
			}
		}

		tracing::debug!(
			probed = summary.probed,
			unavailable = summary.unavailable,
			"Health monitor tick finished."
		);

		summary
	}

	/// Ticks until `shutdown` flips to `true` or its sender is dropped.
	pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
		tracing::info!(interval_ms = self.interval.as_millis() as u64, "Health monitor started.");

		loop {
			let summary = self.tick().await;
			let delay = if summary.aborted > 0 {
				TICK_ERROR_BACKOFF.min(self.interval)
			} else {
				self.interval
			};

			tokio::select! {
				_ = tokio::time::sleep(delay) => {},
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						break;
					}
				},
			}
		}

		tracing::info!("Health monitor stopped.");
	}

	pub fn spawn(self: Arc<Self>) -> MonitorHandle {
		let (shutdown, receiver) = watch::channel(false);
		let task = tokio::spawn(self.run(receiver));

		MonitorHandle { shutdown, task }
	}
}

pub struct MonitorHandle {
	shutdown: watch::Sender<bool>,
	task: tokio::task::JoinHandle<()>,
}
impl MonitorHandle {
	pub async fn stop(self) {
		let _ = self.shutdown.send(true);

		if let Err(err) = self.task.await {
			tracing::warn!(error = %err, "Health monitor task ended abnormally.");
		}
	}
}
