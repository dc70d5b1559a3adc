//! Retrieval-augmented synthesis over the façade and the category stores.

pub mod insights;
pub mod ranking;
pub mod strategy;
pub mod synthesis;

use std::{
	collections::BTreeMap,
	sync::{Arc, Mutex},
};

use futures::future;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
	Error, Result,
	facade::{SearchRequest, SearchResult, StorageFacade},
	stores::{ContentStore, StoreHit, StoreKind, StoreQuery},
};
use insights::CrossReference;
use strata_domain::{
	rag::{RagDomain, RetrievalStrategy, SynthesisMode},
	text,
};
use synthesis::StructureSummary;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RagQuery {
	pub query: String,
	#[serde(default)]
	pub domain: Option<RagDomain>,
	/// Overrides adaptive selection.
	#[serde(default)]
	pub strategy: Option<RetrievalStrategy>,
	#[serde(default)]
	pub mode: Option<SynthesisMode>,
	#[serde(default)]
	pub max_sources: Option<usize>,
	#[serde(default)]
	pub item_types: Vec<String>,
}
impl RagQuery {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
	Store(StoreKind),
	Vector,
}

#[derive(Clone, Debug, Serialize)]
pub struct RagSource {
	pub id: Uuid,
	pub origin: SourceOrigin,
	pub content: String,
	pub item_type: Option<String>,
	pub domain: RagDomain,
	pub relevance: f32,
	pub confidence: f32,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Set by ranking.
	pub score: f32,
}
impl RagSource {
	/// The grouping key used by structured synthesis.
	pub fn source_type(&self) -> String {
		match self.origin {
			SourceOrigin::Store(kind) => kind.as_str().to_string(),
			SourceOrigin::Vector => "vector".to_string(),
		}
	}

	fn from_store(hit: StoreHit) -> Self {
		Self {
			id: hit.id,
			origin: SourceOrigin::Store(hit.store),
			domain: domain_of(hit.metadata.domain.as_deref()),
			confidence: hit.metadata.confidence,
			created_at: hit.metadata.created_at,
			content: hit.content,
			item_type: hit.item_type,
			relevance: hit.relevance,
			score: 0.0,
		}
	}

	fn from_vector(result: SearchResult) -> Self {
		let metadata = result.entry.metadata;

		Self {
			id: metadata.id(),
			origin: SourceOrigin::Vector,
			domain: domain_of(metadata.domain.as_deref()),
			confidence: metadata.confidence,
			created_at: metadata.created_at,
			item_type: None,
			content: result.entry.content,
			relevance: result.relevance,
			score: 0.0,
		}
	}
}

/// How the engine framed the query. Explanatory only.
#[derive(Clone, Debug, Serialize)]
pub struct ReasoningTrace {
	pub query_terms: usize,
	pub significant_terms: Vec<String>,
	pub domain: RagDomain,
	pub strategy: RetrievalStrategy,
	pub strategy_reason: String,
	pub stores_queried: Vec<StoreKind>,
	pub failed_stores: Vec<StoreKind>,
	pub vector_query: bool,
	pub candidates: usize,
	pub kept: usize,
	pub min_relevance: f32,
	pub confidence_threshold: f32,
	pub high_confidence: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct RagResponse {
	pub query: String,
	pub domain: RagDomain,
	pub strategy: RetrievalStrategy,
	pub mode: SynthesisMode,
	pub sources: Vec<RagSource>,
	pub synthesis: String,
	pub structure: StructureSummary,
	pub insights: Vec<String>,
	pub cross_references: Vec<CrossReference>,
	pub reasoning: ReasoningTrace,
	pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunningStats {
	pub queries: u64,
	pub avg_latency_ms: f64,
	pub avg_sources: f64,
}
impl RunningStats {
	fn record(&mut self, latency_ms: f64, sources: usize) {
		self.queries += 1;

		let n = self.queries as f64;

		self.avg_latency_ms += (latency_ms - self.avg_latency_ms) / n;
		self.avg_sources += (sources as f64 - self.avg_sources) / n;
	}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RagMetrics {
	pub overall: RunningStats,
	pub by_domain: BTreeMap<String, RunningStats>,
	pub by_strategy: BTreeMap<String, RunningStats>,
}

pub struct RagEngine {
	facade: Arc<StorageFacade>,
	stores: Vec<Arc<dyn ContentStore>>,
	cfg: strata_config::Rag,
	metrics: Mutex<RagMetrics>,
}
impl RagEngine {
	pub fn new(
		facade: Arc<StorageFacade>,
		stores: Vec<Arc<dyn ContentStore>>,
		cfg: strata_config::Rag,
	) -> Self {
		Self { facade, stores, cfg, metrics: Mutex::new(RagMetrics::default()) }
	}

	pub fn config(&self) -> &strata_config::Rag {
		&self.cfg
	}

	pub async fn query(&self, query: &RagQuery) -> Result<RagResponse> {
		if query.query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let started = Instant::now();
		let domain = query.domain.unwrap_or(self.cfg.active_domain);
		let (strategy, strategy_reason) = match query.strategy {
			Some(strategy) => (strategy, "Strategy was requested explicitly.".to_string()),
			None => strategy::choose(&query.query, domain, &self.cfg),
		};
		let mode = query.mode.unwrap_or(self.cfg.synthesis_mode);
		let max_sources = query.max_sources.unwrap_or(self.cfg.max_sources).max(1);
		let kinds = strategy::stores_for(strategy, domain);
		let store_query = StoreQuery {
			query: query.query.clone(),
			item_types: query.item_types.clone(),
			max_results: self.cfg.per_store_max_results.max(1),
			domain: Some(domain),
		};
		let targets = self
			.stores
			.iter()
			.filter(|store| kinds.contains(&store.kind()))
			.collect::<Vec<_>>();
		let store_searches =
			future::join_all(targets.iter().map(|store| store.search(&store_query)));
		let vector_search = async {
			if !strategy.uses_vector_query() {
				return None;
			}

			let request =
				SearchRequest::new(query.query.clone(), self.cfg.per_store_max_results.max(1));

			Some(self.facade.semantic_search(&request).await)
		};
		let (store_results, vector_result) = future::join(store_searches, vector_search).await;
		let mut candidates = Vec::new();
		let mut stores_queried = Vec::with_capacity(targets.len());
		let mut failed_stores = Vec::new();

		for (store, result) in targets.iter().zip(store_results) {
			stores_queried.push(store.kind());

			match result {
				Ok(hits) => candidates.extend(hits.into_iter().map(RagSource::from_store)),
				Err(err) => {
					failed_stores.push(store.kind());

					tracing::warn!(
						store = %store.kind(),
						error = %err,
						"Content store search failed."
					);
				},
			}
		}

		match vector_result {
			Some(Ok(results)) => {
				candidates.extend(results.into_iter().map(RagSource::from_vector));
			},
			Some(Err(err)) => {
				tracing::warn!(error = %err, "Vector query failed.");
			},
			None => {},
		}

		let candidate_count = candidates.len();
		let sources = ranking::rank(
			candidates,
			domain,
			self.cfg.min_relevance,
			max_sources,
			OffsetDateTime::now_utc(),
		);
		let synthesis = synthesis::synthesize(mode, &sources, self.cfg.confidence_threshold);
		let structure = synthesis::structure(&sources);
		let insights = insights::extract(&sources, domain, self.cfg.confidence_threshold);
		let cross_references =
			insights::cross_references(&sources, self.cfg.cross_reference_min_terms);
		let mut significant_terms =
			text::significant_terms(&query.query).into_iter().collect::<Vec<_>>();

		significant_terms.sort();

		let reasoning = ReasoningTrace {
			query_terms: text::tokenize(&query.query).len(),
			significant_terms,
			domain,
			strategy,
			strategy_reason,
			stores_queried,
			failed_stores,
			vector_query: strategy.uses_vector_query(),
			candidates: candidate_count,
			kept: sources.len(),
			min_relevance: self.cfg.min_relevance,
			confidence_threshold: self.cfg.confidence_threshold,
			high_confidence: sources
				.iter()
				.filter(|source| source.confidence >= self.cfg.confidence_threshold)
				.count(),
		};
		let elapsed = started.elapsed();

		self.record(domain, strategy, elapsed.as_secs_f64() * 1_000.0, sources.len());

		tracing::debug!(
			strategy = strategy.as_str(),
			domain = domain.as_str(),
			sources = sources.len(),
			candidates = candidate_count,
			"RAG query finished."
		);

		Ok(RagResponse {
			query: query.query.clone(),
			domain,
			strategy,
			mode,
			sources,
			synthesis,
			structure,
			insights,
			cross_references,
			reasoning,
			elapsed_ms: elapsed.as_millis() as u64,
		})
	}

	pub fn metrics(&self) -> RagMetrics {
		self.lock().clone()
	}

	fn record(
		&self,
		domain: RagDomain,
		strategy: RetrievalStrategy,
		latency_ms: f64,
		sources: usize,
	) {
		let mut metrics = self.lock();

		metrics.overall.record(latency_ms, sources);
		metrics
			.by_domain
			.entry(domain.as_str().to_string())
			.or_default()
			.record(latency_ms, sources);
		metrics
			.by_strategy
			.entry(strategy.as_str().to_string())
			.or_default()
			.record(latency_ms, sources);
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, RagMetrics> {
		self.metrics.lock().unwrap_or_else(|err| err.into_inner())
	}
}

fn domain_of(raw: Option<&str>) -> RagDomain {
	raw.map(RagDomain::parse).unwrap_or_default()
}
