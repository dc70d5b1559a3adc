use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

use strata_domain::{
	Priority, Tier,
	rag::{RagDomain, RetrievalStrategy, SynthesisMode},
	routing::{LoadBalancing, RoutingRule, RoutingStrategy},
};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub router: Router,
	pub tiers: Tiers,
	pub providers: Providers,
	#[serde(default)]
	pub rag: Rag,
	#[serde(default)]
	pub ttl: TtlSeconds,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Router {
	pub strategy: RoutingStrategy,
	pub load_balancing: LoadBalancing,
	pub failure_threshold: u32,
	pub recovery_timeout_ms: u64,
	pub health_check_interval_ms: u64,
	pub max_retries: u32,
	pub operation_timeout_ms: u64,
	/// Queries longer than this also fan out to the semantic tier.
	pub semantic_query_min_chars: usize,
	pub tier_weights: TierWeights,
	pub rules: Vec<RoutingRule>,
}
impl Default for Router {
	fn default() -> Self {
		Self {
			strategy: RoutingStrategy::Intelligent,
			load_balancing: LoadBalancing::ResponseTime,
			failure_threshold: 5,
			recovery_timeout_ms: 60_000,
			health_check_interval_ms: 30_000,
			max_retries: 2,
			operation_timeout_ms: 30_000,
			semantic_query_min_chars: 20,
			tier_weights: TierWeights::default(),
			rules: Vec::new(),
		}
	}
}

/// Relative preference per tier. A weight of zero removes the tier from selection.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TierWeights {
	pub fast_cache: f32,
	pub semantic_vector: f32,
	pub durable_persistent: f32,
	pub cold_archive: f32,
}
impl TierWeights {
	pub fn weight(&self, tier: Tier) -> f32 {
		match tier {
			Tier::FastCache => self.fast_cache,
			Tier::SemanticVector => self.semantic_vector,
			Tier::DurablePersistent => self.durable_persistent,
			Tier::ColdArchive => self.cold_archive,
		}
	}
}
impl Default for TierWeights {
	fn default() -> Self {
		Self { fast_cache: 1.0, semantic_vector: 1.0, durable_persistent: 1.0, cold_archive: 0.5 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Tiers {
	#[serde(default)]
	pub cache: CacheTier,
	pub semantic: Option<SemanticTier>,
	pub persistent: Option<PersistentTier>,
	pub archive: Option<ArchiveTier>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheTier {
	pub enabled: bool,
	pub capacity: usize,
}
impl Default for CacheTier {
	fn default() -> Self {
		Self { enabled: true, capacity: 10_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct SemanticTier {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default)]
	pub min_score: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PersistentTier {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ArchiveTier {
	pub root: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	/// `local` selects the built-in hashing embedder; anything else is an OpenAI-compatible
	/// HTTP endpoint.
	pub provider_id: String,
	#[serde(default)]
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl EmbeddingProviderConfig {
	pub fn is_local(&self) -> bool {
		self.provider_id.eq_ignore_ascii_case("local")
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rag {
	pub max_sources: usize,
	pub per_store_max_results: usize,
	pub min_relevance: f32,
	pub confidence_threshold: f32,
	pub adaptive_strategy: bool,
	pub default_strategy: RetrievalStrategy,
	pub synthesis_mode: SynthesisMode,
	pub active_domain: RagDomain,
	pub technical_terms: Vec<String>,
	pub business_terms: Vec<String>,
	pub cross_reference_min_terms: usize,
}
impl Default for Rag {
	fn default() -> Self {
		Self {
			max_sources: 12,
			per_store_max_results: 8,
			min_relevance: 0.05,
			confidence_threshold: 0.6,
			adaptive_strategy: true,
			default_strategy: RetrievalStrategy::Hybrid,
			synthesis_mode: SynthesisMode::Structured,
			active_domain: RagDomain::General,
			technical_terms: to_strings(&[
				"api",
				"architecture",
				"cache",
				"cluster",
				"code",
				"connection",
				"database",
				"deployment",
				"index",
				"latency",
				"memory",
				"optimize",
				"performance",
				"pooling",
				"query",
				"schema",
				"server",
				"service",
				"thread",
				"throughput",
			]),
			business_terms: to_strings(&[
				"budget",
				"contract",
				"customer",
				"growth",
				"market",
				"pricing",
				"quarter",
				"revenue",
				"roadmap",
				"sales",
				"stakeholder",
				"strategy",
			]),
			cross_reference_min_terms: 3,
		}
	}
}

/// Cache lifetime per priority. Zero means the entry does not expire.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TtlSeconds {
	pub critical: u64,
	pub high: u64,
	pub standard: u64,
	pub low: u64,
}
impl TtlSeconds {
	pub fn for_priority(&self, priority: Priority) -> Option<u64> {
		let seconds = match priority {
			Priority::Critical => self.critical,
			Priority::High => self.high,
			Priority::Standard => self.standard,
			Priority::Low => self.low,
		};

		(seconds > 0).then_some(seconds)
	}
}
impl Default for TtlSeconds {
	fn default() -> Self {
		Self { critical: 0, high: 604_800, standard: 86_400, low: 3_600 }
	}
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn to_strings(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}
