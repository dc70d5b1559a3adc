use std::sync::Arc;

use strata_config::Config;
use strata_service::Engine;
use strata_storage::{
	TierBackend, archive::ArchiveTier, cache::CacheTier, postgres::PostgresTier,
	qdrant::SemanticTier,
};

#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<Engine>,
}
impl AppState {
	/// Connects every configured tier, then assembles the engine around them.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let mut backends: Vec<Arc<dyn TierBackend>> = Vec::new();

		if config.tiers.cache.enabled {
			backends.push(Arc::new(CacheTier::from_config(&config)));
		}
		if let Some(semantic) = config.tiers.semantic.as_ref() {
			let embedder = strata_providers::from_config(&config.providers.embedding);

			backends.push(Arc::new(SemanticTier::connect(semantic, embedder).await?));
		}
		if let Some(persistent) = config.tiers.persistent.as_ref() {
			backends.push(Arc::new(PostgresTier::connect(persistent).await?));
		}
		if let Some(archive) = config.tiers.archive.as_ref() {
			backends.push(Arc::new(ArchiveTier::new(&archive.root)));
		}

		if backends.is_empty() {
			tracing::warn!("No storage tier is configured; writes will not be stored.");
		}

		let engine = Engine::new(&config, backends)?;

		Ok(Self::from_engine(engine))
	}

	pub fn from_engine(engine: Engine) -> Self {
		Self { engine: Arc::new(engine) }
	}
}
