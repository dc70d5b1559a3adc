pub mod facade;
pub mod health;
pub mod rag;
pub mod router;
pub mod stores;

mod error;

use std::{
	collections::BTreeMap,
	sync::{Arc, Mutex},
	time::Duration,
};

pub use error::{Error, Result};
pub use facade::{
	DeleteReport, FacadeMetrics, FacadeSettings, SearchRequest, SearchResult, StorageFacade,
	StoreReceipt, TierAttempt, TierFailure, TierOutcome, UpdateReport,
};
pub use health::{HealthMonitor, MonitorHandle, TickSummary};
pub use rag::{RagEngine, RagMetrics, RagQuery, RagResponse, RagSource};
pub use router::{MemoryRouter, RouterMetrics, RouterSettings, TierSnapshot};
pub use stores::{CategoryStore, ContentStore, StoreItem, StoreKind, StoreQuery};
use strata_config::Config;
use strata_storage::TierBackend;

/// Composition root for the routing and synthesis layers.
///
/// Everything is constructed here from configuration and the wired tier backends. The health
/// monitor only runs between [`Engine::start`] and [`Engine::stop`].
pub struct Engine {
	pub facade: Arc<StorageFacade>,
	pub router: Arc<MemoryRouter>,
	pub rag: Arc<RagEngine>,
	stores: BTreeMap<StoreKind, Arc<CategoryStore>>,
	monitor: Arc<HealthMonitor>,
	running: Mutex<Option<MonitorHandle>>,
}
impl Engine {
	pub fn new(cfg: &Config, backends: Vec<Arc<dyn TierBackend>>) -> Result<Self> {
		let facade =
			Arc::new(StorageFacade::new(backends, FacadeSettings::from_config(&cfg.router)));
		let router = Arc::new(MemoryRouter::new(
			Arc::clone(&facade),
			RouterSettings::from_config(&cfg.router),
		));

		for rule in &cfg.router.rules {
			router.register_rule(rule.clone())?;
		}

		let stores = StoreKind::ALL
			.into_iter()
			.map(|kind| (kind, Arc::new(CategoryStore::new(kind, Arc::clone(&facade)))))
			.collect::<BTreeMap<_, _>>();
		let content_stores = stores
			.values()
			.map(|store| Arc::clone(store) as Arc<dyn ContentStore>)
			.collect();
		let rag = Arc::new(RagEngine::new(Arc::clone(&facade), content_stores, cfg.rag.clone()));
		let monitor = Arc::new(HealthMonitor::new(
			Arc::clone(&router),
			Duration::from_millis(cfg.router.health_check_interval_ms),
		));

		tracing::info!(
			tiers = ?facade.tiers(),
			rules = router.rules().len(),
			strategy = router.settings().strategy.as_str(),
			"Engine assembled."
		);

		Ok(Self { facade, router, rag, stores, monitor, running: Mutex::new(None) })
	}

	pub fn content_store(&self, kind: StoreKind) -> Option<&Arc<CategoryStore>> {
		self.stores.get(&kind)
	}

	/// Starts the health monitor. Calling it again while running does nothing.
	pub fn start(&self) {
		let mut running = self.lock();

		if running.is_none() {
			*running = Some(Arc::clone(&self.monitor).spawn());
		}
	}

	pub async fn stop(&self) {
		let handle = self.lock().take();

		if let Some(handle) = handle {
			handle.stop().await;
		}
	}

	pub fn is_running(&self) -> bool {
		self.lock().is_some()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Option<MonitorHandle>> {
		self.running.lock().unwrap_or_else(|err| err.into_inner())
	}
}
