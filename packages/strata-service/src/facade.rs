//! Canonical per-tier primitives and the default write path.
//!
//! Every backend call goes through [`StorageFacade::call`], which applies the operation
//! timeout and turns the backend result into a [`TierOutcome`]. Nothing above this module
//! sees a backend error as an `Err`.

use std::{
	collections::{BTreeMap, HashMap},
	sync::{Arc, Mutex},
	time::Duration,
};

use futures::future;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{Error, Result};
use strata_domain::{
	Context, Entry, LocationToken, Metadata, MetadataPatch, Tier, health, selection,
};
use strata_storage::{BoxFuture, HealthReport, TierBackend, TierHit, TierQuery};

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const SLOW_ACCESS_MS: u64 = 1_000;

const SLOW_ACCESS_PENALTY: f32 = 0.9;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TierFailure {
	pub tier: Tier,
	pub reason: String,
	pub timed_out: bool,
}

/// Result of one backend call, success or failure, with its wall time.
#[derive(Debug)]
pub struct TierOutcome<T> {
	pub tier: Tier,
	pub elapsed: Duration,
	pub result: std::result::Result<T, TierFailure>,
}
impl<T> TierOutcome<T> {
	pub fn is_ok(&self) -> bool {
		self.result.is_ok()
	}

	pub fn attempt(&self) -> TierAttempt {
		TierAttempt {
			tier: self.tier,
			elapsed_ms: millis(self.elapsed),
			error: self.result.as_ref().err().map(|failure| failure.reason.clone()),
		}
	}
}

/// Serializable trace of one tier call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TierAttempt {
	pub tier: Tier,
	pub elapsed_ms: u64,
	pub error: Option<String>,
}
impl TierAttempt {
	pub fn succeeded(&self) -> bool {
		self.error.is_none()
	}

	pub fn elapsed(&self) -> Duration {
		Duration::from_millis(self.elapsed_ms)
	}
}

/// An id is always assigned, even when no tier accepted the write. `succeeded` is the
/// authoritative signal.
#[derive(Clone, Debug, Serialize)]
pub struct StoreReceipt {
	pub id: Uuid,
	pub succeeded: Vec<Tier>,
	pub locations: BTreeMap<Tier, LocationToken>,
	pub attempts: Vec<TierAttempt>,
	pub rule_id: Option<String>,
	pub fallback: bool,
}
impl StoreReceipt {
	pub fn is_stored(&self) -> bool {
		!self.succeeded.is_empty()
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default = "default_max_results")]
	pub max_results: usize,
	#[serde(default)]
	pub contexts: Vec<Context>,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>, max_results: usize) -> Self {
		Self { query: query.into(), max_results, ..Default::default() }
	}

	pub fn validate(&self) -> Result<()> {
		if self.query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}
		if self.max_results == 0 {
			return Err(Error::InvalidRequest {
				message: "max_results must be greater than zero.".to_string(),
			});
		}

		Ok(())
	}

	pub fn tier_query(&self) -> TierQuery {
		TierQuery {
			text: self.query.clone(),
			max_results: self.max_results,
			contexts: self.contexts.clone(),
			tags: self.tags.clone(),
			domain: self.domain.clone(),
			embedding: self.embedding.clone(),
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResult {
	pub entry: Entry,
	pub tier: Tier,
	pub relevance: f32,
	pub score: f32,
	pub access_time_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateReport {
	pub updated: bool,
	pub entry: Option<Entry>,
	pub tiers: Vec<Tier>,
	pub attempts: Vec<TierAttempt>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteReport {
	pub deleted: bool,
	pub tiers: Vec<Tier>,
	pub attempts: Vec<TierAttempt>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FacadeMetrics {
	pub requests: u64,
	pub cache_hits: u64,
	pub cache_misses: u64,
	pub cache_hit_rate: f64,
	pub tier_usage: BTreeMap<Tier, u64>,
	pub avg_response_time_ms: f64,
}

#[derive(Clone, Debug)]
pub struct FacadeSettings {
	pub operation_timeout: Duration,
	/// Queries longer than this also go to the semantic tier.
	pub semantic_query_min_chars: usize,
}
impl FacadeSettings {
	pub fn from_config(cfg: &strata_config::Router) -> Self {
		Self {
			operation_timeout: Duration::from_millis(cfg.operation_timeout_ms),
			semantic_query_min_chars: cfg.semantic_query_min_chars,
		}
	}
}
impl Default for FacadeSettings {
	fn default() -> Self {
		Self::from_config(&strata_config::Router::default())
	}
}

#[derive(Debug, Default)]
struct Counters {
	requests: u64,
	cache_hits: u64,
	cache_misses: u64,
	tier_usage: BTreeMap<Tier, u64>,
	avg_response_time_ms: f64,
	samples: u64,
}

pub struct StorageFacade {
	backends: BTreeMap<Tier, Arc<dyn TierBackend>>,
	settings: FacadeSettings,
	counters: Mutex<Counters>,
}
impl StorageFacade {
	/// A later backend for the same tier replaces an earlier one.
	pub fn new(backends: Vec<Arc<dyn TierBackend>>, settings: FacadeSettings) -> Self {
		let backends = backends.into_iter().map(|backend| (backend.tier(), backend)).collect();

		Self { backends, settings, counters: Mutex::new(Counters::default()) }
	}

	pub fn settings(&self) -> &FacadeSettings {
		&self.settings
	}

	/// Configured tiers in tier order.
	pub fn tiers(&self) -> Vec<Tier> {
		self.backends.keys().copied().collect()
	}

	pub fn has_tier(&self, tier: Tier) -> bool {
		self.backends.contains_key(&tier)
	}

	/// The authoritative placement heuristic, narrowed to configured tiers.
	pub fn default_tiers(&self, content: &str, metadata: &Metadata) -> Vec<Tier> {
		let mut tiers = selection::default_tiers(content, metadata);

		tiers.retain(|tier| self.has_tier(*tier));

		if tiers.is_empty()
			&& let Some(first) = self.backends.keys().next()
		{
			tiers.push(*first);
		}

		tiers
	}

	/// Tiers a plain search consults, in tier order.
	pub fn search_tiers(&self, query: &str) -> Vec<Tier> {
		let mut tiers = vec![Tier::FastCache, Tier::DurablePersistent];

		if query.chars().count() > self.settings.semantic_query_min_chars {
			tiers.push(Tier::SemanticVector);
		}

		tiers.retain(|tier| self.has_tier(*tier));
		tiers.sort();

		tiers
	}

	pub fn prepare_entry(
		&self,
		content: String,
		metadata: Metadata,
		embedding: Option<Vec<f32>>,
	) -> Result<Entry> {
		if content.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "content must be non-empty.".to_string() });
		}
		if embedding.as_ref().is_some_and(|vector| vector.is_empty()) {
			return Err(Error::InvalidRequest {
				message: "embedding must be non-empty when provided.".to_string(),
			});
		}

		Ok(Entry::new(content, metadata).with_embedding(embedding))
	}

	pub async fn store_on(&self, tier: Tier, entry: &Entry) -> TierOutcome<LocationToken> {
		let outcome = self.call(tier, |backend| backend.store(entry)).await;

		self.observe(&outcome);

		outcome
	}

	/// A hit carries the answering tier in `locations`.
	pub async fn retrieve_from(&self, tier: Tier, id: Uuid) -> TierOutcome<Option<Entry>> {
		let mut outcome = self.call(tier, move |backend| backend.retrieve(id)).await;

		self.observe(&outcome);

		if let Ok(Some(entry)) = outcome.result.as_mut()
			&& let Some(backend) = self.backends.get(&tier)
		{
			entry.locations.insert(tier, backend.location(id));
		}

		if tier == Tier::FastCache
			&& let Ok(found) = outcome.result.as_ref()
		{
			let mut counters = self.lock();

			if found.is_some() {
				counters.cache_hits += 1;
			} else {
				counters.cache_misses += 1;
			}
		}

		outcome
	}

	pub async fn search_on(&self, tier: Tier, query: &TierQuery) -> TierOutcome<Vec<TierHit>> {
		let outcome = self.call(tier, |backend| backend.search(query)).await;

		self.observe(&outcome);

		outcome
	}

	pub async fn delete_from(&self, tier: Tier, id: Uuid) -> TierOutcome<bool> {
		let outcome = self.call(tier, move |backend| backend.delete(id)).await;

		self.observe(&outcome);

		outcome
	}

	/// Connectivity probe. Not counted as tier usage.
	pub async fn probe(&self, tier: Tier) -> TierOutcome<HealthReport> {
		self.call(tier, |backend| backend.health_check()).await
	}

	pub async fn store_all(
		&self,
		tiers: &[Tier],
		entry: &Entry,
	) -> Vec<TierOutcome<LocationToken>> {
		future::join_all(tiers.iter().map(|tier| self.store_on(*tier, entry))).await
	}

	/// Stores into the default tiers.
	pub async fn store(
		&self,
		content: String,
		metadata: Metadata,
		embedding: Option<Vec<f32>>,
	) -> Result<StoreReceipt> {
		let entry = self.prepare_entry(content, metadata, embedding)?;
		let tiers = self.default_tiers(&entry.content, &entry.metadata);

		self.count_request();

		let outcomes = self.store_all(&tiers, &entry).await;

		Ok(receipt(entry.id(), outcomes, None, false))
	}

	/// Walks configured tiers in tier order and returns the first copy found.
	pub async fn retrieve(&self, id: Uuid) -> Option<Entry> {
		self.count_request();

		for tier in self.tiers() {
			if let Ok(Some(mut entry)) = self.retrieve_from(tier, id).await.result {
				entry.metadata.record_access();

				return Some(entry);
			}
		}

		None
	}

	pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
		request.validate()?;

		self.count_request();

		let tiers = self.search_tiers(&request.query);

		Ok(self.search_tiers_with(&tiers, request).await)
	}

	/// Vector-only lookup, falling back to a plain search when no semantic tier is wired.
	pub async fn semantic_search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
		request.validate()?;

		self.count_request();

		let tiers = if self.has_tier(Tier::SemanticVector) {
			vec![Tier::SemanticVector]
		} else {
			self.search_tiers(&request.query)
		};

		Ok(self.search_tiers_with(&tiers, request).await)
	}

	pub async fn search_tiers_with(
		&self,
		tiers: &[Tier],
		request: &SearchRequest,
	) -> Vec<SearchResult> {
		let query = request.tier_query();
		let outcomes =
			future::join_all(tiers.iter().map(|tier| self.search_on(*tier, &query))).await;

		rank_results(outcomes, request.max_results)
	}

	/// Retrieves `id` from `tiers` concurrently.
	pub async fn locate(&self, tiers: &[Tier], id: Uuid) -> Vec<TierOutcome<Option<Entry>>> {
		future::join_all(tiers.iter().map(|tier| self.retrieve_from(*tier, id))).await
	}

	/// Read-before-write: merges into the freshest copy and rewrites every tier holding one.
	pub async fn update(
		&self,
		id: Uuid,
		content: Option<String>,
		patch: Option<MetadataPatch>,
	) -> Result<UpdateReport> {
		self.update_on(&self.tiers(), id, content, patch).await
	}

	/// [`Self::update`] restricted to `tiers`.
	pub async fn update_on(
		&self,
		tiers: &[Tier],
		id: Uuid,
		content: Option<String>,
		patch: Option<MetadataPatch>,
	) -> Result<UpdateReport> {
		validate_update(content.as_deref(), patch.as_ref())?;
		self.count_request();

		let located = self.locate(tiers, id).await;
		let mut attempts = located.iter().map(TierOutcome::attempt).collect::<Vec<_>>();
		let mut holders = Vec::new();
		let mut freshest: Option<Entry> = None;

		for outcome in located {
			if let Ok(Some(entry)) = outcome.result {
				holders.push(outcome.tier);

				let updated_at = entry.metadata.updated_at();
				let newer =
					freshest.as_ref().is_none_or(|held| updated_at > held.metadata.updated_at());

				if newer {
					freshest = Some(entry);
				}
			}
		}

		let Some(mut entry) = freshest else {
			tracing::debug!(entry_id = %id, "Update target was not found in any tier.");

			return Ok(UpdateReport { updated: false, entry: None, tiers: Vec::new(), attempts });
		};

		if let Some(content) = content
			&& content != entry.content
		{
			entry.content = content;
			entry.embedding = None;
		}
		if let Some(patch) = patch.as_ref() {
			entry.metadata.apply(patch);
		}

		entry.metadata.touch(OffsetDateTime::now_utc());
		entry.locations.clear();

		let outcomes = self.store_all(&holders, &entry).await;
		let mut tiers = Vec::new();

		for outcome in outcomes {
			attempts.push(outcome.attempt());

			if let Ok(token) = outcome.result {
				entry.locations.insert(outcome.tier, token);
				tiers.push(outcome.tier);
			}
		}

		let updated = !tiers.is_empty();

		Ok(UpdateReport { updated, entry: updated.then_some(entry), tiers, attempts })
	}

	/// Deletes from every configured tier; absence in a tier is not a failure.
	pub async fn delete(&self, id: Uuid) -> DeleteReport {
		self.delete_on(&self.tiers(), id).await
	}

	/// [`Self::delete`] restricted to `tiers`.
	pub async fn delete_on(&self, tiers: &[Tier], id: Uuid) -> DeleteReport {
		self.count_request();

		let outcomes =
			future::join_all(tiers.iter().map(|tier| self.delete_from(*tier, id))).await;
		let attempts = outcomes.iter().map(TierOutcome::attempt).collect::<Vec<_>>();
		let deleted_from = outcomes
			.into_iter()
			.filter(|outcome| matches!(outcome.result, Ok(true)))
			.map(|outcome| outcome.tier)
			.collect::<Vec<_>>();

		DeleteReport { deleted: !deleted_from.is_empty(), tiers: deleted_from, attempts }
	}

	pub fn metrics(&self) -> FacadeMetrics {
		let counters = self.lock();
		let lookups = counters.cache_hits + counters.cache_misses;

		FacadeMetrics {
			requests: counters.requests,
			cache_hits: counters.cache_hits,
			cache_misses: counters.cache_misses,
			cache_hit_rate: if lookups == 0 {
				0.0
			} else {
				counters.cache_hits as f64 / lookups as f64
			},
			tier_usage: counters.tier_usage.clone(),
			avg_response_time_ms: counters.avg_response_time_ms,
		}
	}

	async fn call<'a, T, F>(&'a self, tier: Tier, op: F) -> TierOutcome<T>
	where
		F: FnOnce(&'a dyn TierBackend) -> BoxFuture<'a, strata_storage::Result<T>>,
	{
		let Some(backend) = self.backends.get(&tier) else {
			return TierOutcome {
				tier,
				elapsed: Duration::ZERO,
				result: Err(TierFailure {
					tier,
					reason: "Tier is not configured.".to_string(),
					timed_out: false,
				}),
			};
		};
		let started = Instant::now();
		let timeout = self.settings.operation_timeout;
		let result = match tokio::time::timeout(timeout, op(backend.as_ref())).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err)) => Err(TierFailure { tier, reason: err.to_string(), timed_out: false }),
			Err(_) => Err(TierFailure {
				tier,
				reason: format!("Timed out after {} ms.", millis(timeout)),
				timed_out: true,
			}),
		};
		let elapsed = started.elapsed();

		if let Err(failure) = result.as_ref() {
			tracing::warn!(
				tier = %tier,
				error = %failure.reason,
				timed_out = failure.timed_out,
				"Tier operation failed."
			);
		}

		TierOutcome { tier, elapsed, result }
	}

	fn observe<T>(&self, outcome: &TierOutcome<T>) {
		let mut counters = self.lock();
		let sample = outcome.elapsed.as_secs_f64() * 1_000.0;

		*counters.tier_usage.entry(outcome.tier).or_default() += 1;

		counters.avg_response_time_ms = if counters.samples == 0 {
			sample
		} else {
			health::ema(counters.avg_response_time_ms, sample)
		};
		counters.samples += 1;
	}

	fn count_request(&self) {
		self.lock().requests += 1;
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
		self.counters.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Relative preference applied to search relevance, faster tiers first.
pub fn tier_boost(tier: Tier) -> f32 {
	match tier {
		Tier::FastCache => 1.2,
		Tier::SemanticVector => 1.1,
		Tier::DurablePersistent => 1.0,
		Tier::ColdArchive => 0.9,
	}
}

/// Merges per-tier hits: boost by tier, penalize slow tiers, keep the best copy per id.
pub fn rank_results(
	outcomes: Vec<TierOutcome<Vec<TierHit>>>,
	max_results: usize,
) -> Vec<SearchResult> {
	let mut best: HashMap<Uuid, SearchResult> = HashMap::new();

	for outcome in outcomes {
		let tier = outcome.tier;
		let access_time_ms = millis(outcome.elapsed);
		let Ok(hits) = outcome.result else {
			continue;
		};

		for hit in hits {
			let mut score = hit.relevance * tier_boost(tier);

			if access_time_ms > SLOW_ACCESS_MS {
				score *= SLOW_ACCESS_PENALTY;
			}

			let candidate = SearchResult {
				entry: hit.entry,
				tier,
				relevance: hit.relevance,
				score,
				access_time_ms,
			};
			let id = candidate.entry.id();

			match best.get(&id) {
				Some(existing) if existing.score >= candidate.score => {},
				_ => {
					best.insert(id, candidate);
				},
			}
		}
	}

	let mut results = best.into_values().collect::<Vec<_>>();

	results.sort_by(|a, b| {
		b.score.total_cmp(&a.score).then_with(|| a.entry.id().cmp(&b.entry.id()))
	});
	results.truncate(max_results);

	results
}

pub(crate) fn receipt(
	id: Uuid,
	outcomes: Vec<TierOutcome<LocationToken>>,
	rule_id: Option<String>,
	fallback: bool,
) -> StoreReceipt {
	let attempts = outcomes.iter().map(TierOutcome::attempt).collect();
	let mut succeeded = Vec::new();
	let mut locations = BTreeMap::new();

	for outcome in outcomes {
		if let Ok(token) = outcome.result {
			succeeded.push(outcome.tier);
			locations.insert(outcome.tier, token);
		}
	}

	StoreReceipt { id, succeeded, locations, attempts, rule_id, fallback }
}

pub(crate) fn validate_update(content: Option<&str>, patch: Option<&MetadataPatch>) -> Result<()> {
	if content.is_none() && patch.is_none_or(MetadataPatch::is_empty) {
		return Err(Error::InvalidRequest {
			message: "update needs content or metadata changes.".to_string(),
		});
	}
	if content.is_some_and(|content| content.trim().is_empty()) {
		return Err(Error::InvalidRequest { message: "content must be non-empty.".to_string() });
	}

	Ok(())
}

pub(crate) fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_max_results() -> usize {
	DEFAULT_MAX_RESULTS
}

#[cfg(test)]
mod tests {
	use super::*;
	use strata_domain::Priority;
	use strata_testkit::ScriptedTier;

	fn facade_with(tiers: &[Tier]) -> (StorageFacade, Vec<Arc<ScriptedTier>>) {
		let scripted = tiers.iter().map(|tier| Arc::new(ScriptedTier::new(*tier))).collect::<Vec<_>>();
		let backends = scripted
			.iter()
			.map(|tier| Arc::clone(tier) as Arc<dyn TierBackend>)
			.collect::<Vec<_>>();

		(StorageFacade::new(backends, FacadeSettings::default()), scripted)
	}

	fn hit(content: &str, relevance: f32) -> TierHit {
		TierHit {
			entry: Entry::new(content, Metadata::new(Context::Knowledge, Priority::High)),
			relevance,
		}
	}

	#[test]
	fn ranking_boosts_fast_tiers_and_penalizes_slow_ones() {
		let cached = hit("cached", 0.5);
		let durable = hit("durable", 0.5);
		let slow = hit("slow", 0.5);
		let results = rank_results(
			vec![
				TierOutcome {
					tier: Tier::DurablePersistent,
					elapsed: Duration::from_millis(10),
					result: Ok(vec![durable]),
				},
				TierOutcome {
					tier: Tier::FastCache,
					elapsed: Duration::from_millis(1),
					result: Ok(vec![cached]),
				},
				TierOutcome {
					tier: Tier::SemanticVector,
					elapsed: Duration::from_millis(1_500),
					result: Ok(vec![slow]),
				},
			],
			10,
		);
		let order = results.iter().map(|result| result.entry.content.as_str()).collect::<Vec<_>>();

		assert_eq!(order, vec!["cached", "durable", "slow"]);
		assert!((results[2].score - 0.5 * 1.1 * 0.9).abs() < 1e-6);
	}

	#[test]
	fn ranking_deduplicates_by_id_and_is_idempotent() {
		let shared = hit("shared", 0.4);
		let results = rank_results(
			vec![
				TierOutcome {
					tier: Tier::DurablePersistent,
					elapsed: Duration::ZERO,
					result: Ok(vec![shared.clone()]),
				},
				TierOutcome { tier: Tier::FastCache, elapsed: Duration::ZERO, result: Ok(vec![shared]) },
				TierOutcome {
					tier: Tier::SemanticVector,
					elapsed: Duration::ZERO,
					result: Err(TierFailure {
						tier: Tier::SemanticVector,
						reason: "down".to_string(),
						timed_out: false,
					}),
				},
			],
			10,
		);

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].tier, Tier::FastCache);

		let again = rank_results(
			vec![TierOutcome {
				tier: Tier::FastCache,
				elapsed: Duration::ZERO,
				result: Ok(results
					.iter()
					.map(|result| TierHit { entry: result.entry.clone(), relevance: result.relevance })
					.collect()),
			}],
			10,
		);

		assert_eq!(again.len(), results.len());
		assert_eq!(again[0].entry.id(), results[0].entry.id());
	}

	#[tokio::test]
	async fn store_returns_an_id_even_when_every_tier_fails() {
		let (facade, scripted) = facade_with(&[Tier::FastCache, Tier::DurablePersistent]);

		for tier in &scripted {
			tier.fail_always(true);
		}

		let receipt = facade
			.store(
				"critical but short".to_string(),
				Metadata::new(Context::System, Priority::Critical),
				None,
			)
			.await
			.expect("Store must not raise.");

		assert!(!receipt.is_stored());
		assert_eq!(receipt.attempts.len(), 2);
		assert!(receipt.attempts.iter().all(|attempt| !attempt.succeeded()));
	}

	#[tokio::test]
	async fn critical_short_content_lands_in_cache_and_persistent() {
		let (facade, scripted) =
			facade_with(&[Tier::FastCache, Tier::SemanticVector, Tier::DurablePersistent]);
		let receipt = facade
			.store("ten chars!".to_string(), Metadata::new(Context::Knowledge, Priority::Critical), None)
			.await
			.expect("Store must succeed.");

		assert_eq!(receipt.succeeded, vec![Tier::FastCache, Tier::DurablePersistent]);
		assert_eq!(scripted[1].calls.stores(), 0);

		let loaded = facade.retrieve(receipt.id).await.expect("Entry must be found.");

		assert_eq!(loaded.content, "ten chars!");
		assert_eq!(loaded.metadata.access_count, 1);
		assert_eq!(facade.metrics().cache_hits, 1);
	}

	#[tokio::test]
	async fn update_rewrites_every_holder_and_bumps_updated_at() {
		let (facade, scripted) = facade_with(&[Tier::FastCache, Tier::DurablePersistent]);
		let receipt = facade
			.store("original".to_string(), Metadata::new(Context::Knowledge, Priority::High), None)
			.await
			.expect("Store must succeed.");
		let before = scripted[0].get(receipt.id).expect("Cache copy.").metadata.updated_at();
		let report = facade
			.update(
				receipt.id,
				Some("revised".to_string()),
				Some(MetadataPatch { domain: Some("technical".to_string()), ..Default::default() }),
			)
			.await
			.expect("Update must not raise.");

		assert!(report.updated);
		assert_eq!(report.tiers, vec![Tier::FastCache, Tier::DurablePersistent]);

		for tier in &scripted {
			let stored = tier.get(receipt.id).expect("Copy must remain.");

			assert_eq!(stored.content, "revised");
			assert_eq!(stored.metadata.domain.as_deref(), Some("technical"));
			assert!(stored.metadata.updated_at() >= before);
		}
	}

	#[tokio::test]
	async fn update_and_delete_of_unknown_ids_fail_without_side_effects() {
		let (facade, scripted) = facade_with(&[Tier::FastCache, Tier::DurablePersistent]);
		let id = Uuid::new_v4();
		let update = facade
			.update(id, Some("anything".to_string()), None)
			.await
			.expect("Update must not raise.");

		assert!(!update.updated);
		assert!(update.entry.is_none());

		let delete = facade.delete(id).await;

		assert!(!delete.deleted);
		assert!(delete.tiers.is_empty());

		for tier in &scripted {
			assert_eq!(tier.calls.stores(), 0);
			assert!(tier.is_empty());
		}
	}

	#[tokio::test]
	async fn delete_succeeds_when_any_tier_held_a_copy() {
		let (facade, scripted) = facade_with(&[Tier::FastCache, Tier::DurablePersistent]);
		let entry = Entry::new("archived", Metadata::new(Context::Knowledge, Priority::Low));

		scripted[1].insert(entry.clone());
		scripted[0].fail_always(true);

		let report = facade.delete(entry.id()).await;

		assert!(report.deleted);
		assert_eq!(report.tiers, vec![Tier::DurablePersistent]);
		assert_eq!(report.attempts.len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn slow_tiers_time_out_as_failures() {
		let backend = Arc::new(ScriptedTier::new(Tier::ColdArchive));
		let facade = StorageFacade::new(
			vec![Arc::clone(&backend) as Arc<dyn TierBackend>],
			FacadeSettings { operation_timeout: Duration::from_millis(50), semantic_query_min_chars: 20 },
		);

		backend.set_latency(Duration::from_secs(1));

		let outcome = facade.retrieve_from(Tier::ColdArchive, Uuid::new_v4()).await;
		let failure = outcome.result.expect_err("Slow call must fail.");

		assert!(failure.timed_out);
	}

	#[test]
	fn empty_requests_are_rejected() {
		let (facade, _) = facade_with(&[Tier::FastCache]);

		assert!(matches!(
			facade.prepare_entry(" ".to_string(), Metadata::new(Context::System, Priority::Low), None),
			Err(Error::InvalidRequest { .. })
		));
		assert!(SearchRequest::new("", 5).validate().is_err());
		assert!(SearchRequest::new("query", 0).validate().is_err());
	}
}
