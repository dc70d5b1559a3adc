//! Policy layer over the storage façade.
//!
//! The router owns one [`CircuitBreaker`] and one [`TierHealth`] per configured tier. Both
//! are updated in line from operation outcomes and by the health monitor, so they sit behind
//! a mutex that is never held across an await.

pub mod balance;

use std::{
	collections::BTreeMap,
	future::Future,
	sync::{Arc, Mutex, RwLock},
	time::Duration,
};

use futures::future;
use serde::Serialize;
use uuid::Uuid;

use crate::{
	Error, Result,
	facade::{
		self, DeleteReport, SearchRequest, SearchResult, StorageFacade, StoreReceipt, TierAttempt,
		TierOutcome, UpdateReport,
	},
};
use balance::TierLoad;
use strata_config::TierWeights;
use strata_domain::{
	Entry, LocationToken, Metadata, MetadataPatch, Priority, Tier,
	breaker::{BreakerSnapshot, BreakerState, CircuitBreaker, Transition},
	health::{self, TierHealth},
	routing::{LoadBalancing, RoutingRule, RoutingStrategy, RuleSet, RuleSubject},
};
use strata_storage::HealthReport;

#[derive(Clone, Debug)]
pub struct RouterSettings {
	pub strategy: RoutingStrategy,
	pub load_balancing: LoadBalancing,
	pub failure_threshold: u32,
	pub recovery_timeout: Duration,
	pub max_retries: u32,
	pub weights: TierWeights,
}
impl RouterSettings {
	pub fn from_config(cfg: &strata_config::Router) -> Self {
		Self {
			strategy: cfg.strategy,
			load_balancing: cfg.load_balancing,
			failure_threshold: cfg.failure_threshold,
			recovery_timeout: Duration::from_millis(cfg.recovery_timeout_ms),
			max_retries: cfg.max_retries,
			weights: cfg.tier_weights.clone(),
		}
	}
}
impl Default for RouterSettings {
	fn default() -> Self {
		Self::from_config(&strata_config::Router::default())
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct RouterMetrics {
	pub requests: u64,
	pub successes: u64,
	pub failures: u64,
	pub fallbacks: u64,
	pub breaker_trips: u64,
	pub avg_response_time_ms: f64,
	pub tier_usage: BTreeMap<Tier, u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TierSnapshot {
	pub tier: Tier,
	pub weight: f32,
	pub in_flight: u32,
	pub health: TierHealth,
	pub breaker: BreakerSnapshot,
}

struct TierState {
	breaker: CircuitBreaker,
	health: TierHealth,
	in_flight: u32,
	routed: u64,
}

#[derive(Debug, Default)]
struct Counters {
	requests: u64,
	successes: u64,
	failures: u64,
	fallbacks: u64,
	breaker_trips: u64,
	avg_response_time_ms: f64,
	samples: u64,
}

pub struct MemoryRouter {
	facade: Arc<StorageFacade>,
	settings: RouterSettings,
	rules: RwLock<RuleSet>,
	tiers: Mutex<BTreeMap<Tier, TierState>>,
	counters: Mutex<Counters>,
}
impl MemoryRouter {
	pub fn new(facade: Arc<StorageFacade>, settings: RouterSettings) -> Self {
		let tiers = facade
			.tiers()
			.into_iter()
			.map(|tier| {
				let state = TierState {
					breaker: CircuitBreaker::new(
						settings.failure_threshold,
						settings.recovery_timeout,
					),
					health: TierHealth::new(),
					in_flight: 0,
					routed: 0,
				};

				(tier, state)
			})
			.collect();

		Self {
			facade,
			settings,
			rules: RwLock::new(RuleSet::new()),
			tiers: Mutex::new(tiers),
			counters: Mutex::new(Counters::default()),
		}
	}

	pub fn facade(&self) -> &Arc<StorageFacade> {
		&self.facade
	}

	pub fn settings(&self) -> &RouterSettings {
		&self.settings
	}

	pub fn register_rule(&self, rule: RoutingRule) -> Result<()> {
		let id = rule.id.clone();
		let priority = rule.priority;

		self.rules.write().unwrap_or_else(|err| err.into_inner()).register(rule)?;

		tracing::info!(rule_id = %id, priority, "Routing rule registered.");

		Ok(())
	}

	pub fn remove_rule(&self, id: &str) -> Result<()> {
		let removed = self.rules.write().unwrap_or_else(|err| err.into_inner()).remove(id);

		if !removed {
			return Err(Error::RuleNotFound { id: id.to_string() });
		}

		tracing::info!(rule_id = %id, "Routing rule removed.");

		Ok(())
	}

	/// Rules in evaluation order.
	pub fn rules(&self) -> Vec<RoutingRule> {
		self.rules.read().unwrap_or_else(|err| err.into_inner()).rules()
	}

	/// Tiers a store would target before health and breaker filtering, plus the matching
	/// rule id. A matching rule fully replaces the strategy output.
	pub fn candidate_tiers(&self, entry: &Entry) -> (Vec<Tier>, Option<String>) {
		let subject = RuleSubject {
			content: &entry.content,
			metadata: &entry.metadata,
			has_embedding: entry.embedding.is_some(),
		};
		let matched = {
			let rules = self.rules.read().unwrap_or_else(|err| err.into_inner());

			rules.first_match(&subject).map(|rule| (rule.target_tiers.clone(), rule.id.clone()))
		};
		let (mut tiers, rule_id) = match matched {
			Some((targets, id)) => (targets, Some(id)),
			None => (self.settings.strategy.candidate_tiers(&entry.content, &entry.metadata), None),
		};
		let mut seen = Vec::with_capacity(tiers.len());

		tiers.retain(|tier| {
			let keep = !seen.contains(tier) && self.is_routable(*tier);

			seen.push(*tier);

			keep
		});

		(tiers, rule_id)
	}

	/// Best-effort fan-out. Never fails because of a tier; inspect `succeeded`.
	pub async fn store(
		&self,
		content: String,
		metadata: Metadata,
		embedding: Option<Vec<f32>>,
	) -> Result<StoreReceipt> {
		let entry = self.facade.prepare_entry(content, metadata, embedding)?;
		let started = tokio::time::Instant::now();
		let (candidates, rule_id) = self.candidate_tiers(&entry);
		let mut targets = self.admit(&candidates);
		let mut fallback = false;

		if targets.is_empty() {
			fallback = true;

			self.count_fallback();

			match self.fallback_tier() {
				Some(tier) => {
					tracing::warn!(
						entry_id = %entry.id(),
						tier = %tier,
						"No candidate tier is available; falling back."
					);

					targets.push(tier);
				},
				None => {
					tracing::warn!(entry_id = %entry.id(), "No tier is available for store.");
				},
			}
		}

		let outcomes =
			future::join_all(targets.iter().map(|tier| self.store_with_retry(*tier, &entry)))
				.await;
		let receipt = facade::receipt(entry.id(), outcomes, rule_id, fallback);

		self.finish(started.elapsed(), receipt.is_stored());

		tracing::debug!(
			entry_id = %receipt.id,
			succeeded = receipt.succeeded.len(),
			attempted = receipt.attempts.len(),
			"Store routed."
		);

		Ok(receipt)
	}

	/// Walks tiers in priority order and returns the first hit, promoting it into the cache.
	pub async fn retrieve(&self, id: Uuid, priority: Priority) -> Option<Entry> {
		let started = tokio::time::Instant::now();
		let mut found = None;

		for tier in retrieval_order(priority) {
			if !self.facade.has_tier(tier) || !self.allow(tier) {
				continue;
			}

			let outcome = self.tracked(tier, self.facade.retrieve_from(tier, id)).await;

			if let Ok(Some(entry)) = outcome.result {
				found = Some((tier, entry));

				break;
			}
		}

		let found = match found {
			Some((tier, mut entry)) => {
				entry.metadata.record_access();

				if tier != Tier::FastCache
					&& let Some(token) = self.promote(&entry).await
				{
					entry.locations.insert(Tier::FastCache, token);
				}

				Some(entry)
			},
			None => None,
		};

		self.finish(started.elapsed(), found.is_some());

		found
	}

	pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
		request.validate()?;

		let started = tokio::time::Instant::now();
		let mut candidates = self.facade.search_tiers(&request.query);

		candidates.retain(|tier| self.is_routable(*tier));

		let ordered = self.balance(&candidates);
		let mut targets = self.admit(&ordered);

		if targets.is_empty() {
			self.count_fallback();

			match self.fallback_tier() {
				Some(tier) => targets.push(tier),
				None => {
					tracing::warn!("No tier is available for search.");

					self.finish(started.elapsed(), false);

					return Ok(Vec::new());
				},
			}
		}

		let query = request.tier_query();
		let outcomes = future::join_all(
			targets.iter().map(|tier| self.tracked(*tier, self.facade.search_on(*tier, &query))),
		)
		.await;
		let answered = outcomes.iter().any(TierOutcome::is_ok);
		let results = facade::rank_results(outcomes, request.max_results);

		self.finish(started.elapsed(), answered);

		Ok(results)
	}

	/// Updates the copies held by tiers that are healthy and admitted by their breaker.
	pub async fn update(
		&self,
		id: Uuid,
		content: Option<String>,
		patch: Option<MetadataPatch>,
	) -> Result<UpdateReport> {
		facade::validate_update(content.as_deref(), patch.as_ref())?;

		let started = tokio::time::Instant::now();
		let targets = self.admit(&self.facade.tiers());
		let report = self.facade.update_on(&targets, id, content, patch).await?;

		self.record_attempts(&report.attempts);
		self.finish(started.elapsed(), report.updated);

		Ok(report)
	}

	/// Deletes from every admitted tier; tiers behind an open breaker keep their copy.
	pub async fn delete(&self, id: Uuid) -> DeleteReport {
		let started = tokio::time::Instant::now();
		let targets = self.admit(&self.facade.tiers());
		let report = self.facade.delete_on(&targets, id).await;

		self.record_attempts(&report.attempts);
		self.finish(started.elapsed(), report.deleted);

		report
	}

	/// Applies one health-monitor probe result.
	pub fn record_probe(&self, outcome: &TierOutcome<HealthReport>) {
		let mut tiers = self.lock_tiers();
		let Some(state) = tiers.get_mut(&outcome.tier) else {
			return;
		};

		match outcome.result.as_ref() {
			Ok(report) => {
				let was_available = state.health.available;

				state.health.record_probe_success(outcome.elapsed, report.available);

				if !was_available && report.available {
					tracing::info!(tier = %outcome.tier, "Tier is available again.");
				}
			},
			Err(failure) => {
				state.health.record_probe_failure(outcome.elapsed);

				tracing::warn!(
					tier = %outcome.tier,
					error = %failure.reason,
					consecutive_failures = state.health.consecutive_failures,
					"Tier probe failed."
				);
			},
		}
	}

	pub fn metrics(&self) -> RouterMetrics {
		let tier_usage = self
			.lock_tiers()
			.iter()
			.map(|(tier, state)| (*tier, state.routed))
			.collect();
		let counters = self.lock_counters();

		RouterMetrics {
			requests: counters.requests,
			successes: counters.successes,
			failures: counters.failures,
			fallbacks: counters.fallbacks,
			breaker_trips: counters.breaker_trips,
			avg_response_time_ms: counters.avg_response_time_ms,
			tier_usage,
		}
	}

	pub fn tier_snapshots(&self) -> Vec<TierSnapshot> {
		let now = now();

		self.lock_tiers()
			.iter()
			.map(|(tier, state)| TierSnapshot {
				tier: *tier,
				weight: self.settings.weights.weight(*tier),
				in_flight: state.in_flight,
				health: state.health.clone(),
				breaker: state.breaker.snapshot(now),
			})
			.collect()
	}

	pub fn breaker_state(&self, tier: Tier) -> Option<BreakerState> {
		self.lock_tiers().get(&tier).map(|state| state.breaker.state())
	}

	pub fn health(&self, tier: Tier) -> Option<TierHealth> {
		self.lock_tiers().get(&tier).map(|state| state.health.clone())
	}

	fn is_routable(&self, tier: Tier) -> bool {
		self.facade.has_tier(tier) && self.settings.weights.weight(tier) > 0.0
	}

	/// Keeps tiers that are healthy and whose breaker admits a request, in input order.
	fn admit(&self, candidates: &[Tier]) -> Vec<Tier> {
		candidates.iter().copied().filter(|tier| self.admits(*tier, true)).collect()
	}

	fn allow(&self, tier: Tier) -> bool {
		self.admits(tier, false)
	}

	fn admits(&self, tier: Tier, require_available: bool) -> bool {
		let now = now();
		let mut tiers = self.lock_tiers();
		let Some(state) = tiers.get_mut(&tier) else {
			return false;
		};

		if require_available && !state.health.available {
			return false;
		}

		let (allowed, transition) = state.breaker.should_allow_request(now);

		if transition == Some(Transition::HalfOpened) {
			tracing::info!(tier = %tier, "Circuit breaker half-open; admitting a trial request.");
		}

		allowed
	}

	/// First healthy, admitted tier in tier order.
	fn fallback_tier(&self) -> Option<Tier> {
		self.facade
			.tiers()
			.into_iter()
			.filter(|tier| self.is_routable(*tier))
			.find(|tier| self.admits(*tier, true))
	}

	fn balance(&self, candidates: &[Tier]) -> Vec<Tier> {
		let mut loads = {
			let tiers = self.lock_tiers();

			candidates
				.iter()
				.filter_map(|tier| {
					tiers.get(tier).map(|state| TierLoad {
						tier: *tier,
						response_time_ms: state.health.response_time_ms,
						routed: state.routed,
						in_flight: state.in_flight,
						weight: self.settings.weights.weight(*tier),
					})
				})
				.collect::<Vec<_>>()
		};

		balance::order(self.settings.load_balancing, &mut loads);

		loads.into_iter().map(|load| load.tier).collect()
	}

	async fn store_with_retry(&self, tier: Tier, entry: &Entry) -> TierOutcome<LocationToken> {
		self.begin(tier);

		let mut attempt = 0;
		let outcome = loop {
			let outcome = self.facade.store_on(tier, entry).await;

			if outcome.is_ok() || attempt >= self.settings.max_retries {
				break outcome;
			}

			attempt += 1;

			tracing::debug!(tier = %tier, entry_id = %entry.id(), attempt, "Retrying tier store.");
		};

		self.end(tier, outcome.elapsed, outcome.is_ok());

		outcome
	}

	async fn tracked<T, F>(&self, tier: Tier, call: F) -> TierOutcome<T>
	where
		F: Future<Output = TierOutcome<T>>,
	{
		self.begin(tier);

		let outcome = call.await;

		self.end(tier, outcome.elapsed, outcome.is_ok());

		outcome
	}

	async fn promote(&self, entry: &Entry) -> Option<LocationToken> {
		if !self.facade.has_tier(Tier::FastCache) || !self.allow(Tier::FastCache) {
			return None;
		}

		let mut promoted = entry.clone();

		promoted.locations.clear();

		match self.facade.store_on(Tier::FastCache, &promoted).await.result {
			Ok(token) => Some(token),
			Err(failure) => {
				tracing::debug!(
					entry_id = %entry.id(),
					error = %failure.reason,
					"Cache promotion failed."
				);

				None
			},
		}
	}

	fn record_attempts(&self, attempts: &[TierAttempt]) {
		for attempt in attempts {
			self.record_outcome(attempt.tier, attempt.elapsed(), attempt.succeeded());
		}
	}

	fn begin(&self, tier: Tier) {
		if let Some(state) = self.lock_tiers().get_mut(&tier) {
			state.in_flight += 1;
		}
	}

	fn end(&self, tier: Tier, elapsed: Duration, ok: bool) {
		if let Some(state) = self.lock_tiers().get_mut(&tier) {
			state.in_flight = state.in_flight.saturating_sub(1);
		}

		self.record_outcome(tier, elapsed, ok);
	}

	fn record_outcome(&self, tier: Tier, elapsed: Duration, ok: bool) {
		let transition = {
			let mut tiers = self.lock_tiers();
			let Some(state) = tiers.get_mut(&tier) else {
				return;
			};

			state.routed += 1;
			state.health.record_operation(elapsed, !ok);

			if ok { state.breaker.record_success() } else { state.breaker.record_failure(now()) }
		};

		match transition {
			Some(Transition::Opened | Transition::Reopened) => {
				self.lock_counters().breaker_trips += 1;

				tracing::warn!(tier = %tier, "Circuit breaker opened.");
			},
			Some(Transition::Closed) => {
				tracing::info!(tier = %tier, "Circuit breaker closed.");
			},
			Some(Transition::HalfOpened) | None => {},
		}
	}

	fn count_fallback(&self) {
		self.lock_counters().fallbacks += 1;
	}

	fn finish(&self, elapsed: Duration, succeeded: bool) {
		let mut counters = self.lock_counters();
		let sample = elapsed.as_secs_f64() * 1_000.0;

		counters.requests += 1;

		if succeeded {
			counters.successes += 1;
		} else {
			counters.failures += 1;
		}

		counters.avg_response_time_ms = if counters.samples == 0 {
			sample
		} else {
			health::ema(counters.avg_response_time_ms, sample)
		};
		counters.samples += 1;
	}

	fn lock_tiers(&self) -> std::sync::MutexGuard<'_, BTreeMap<Tier, TierState>> {
		self.tiers.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn lock_counters(&self) -> std::sync::MutexGuard<'_, Counters> {
		self.counters.lock().unwrap_or_else(|err| err.into_inner())
	}
}

/// Urgent reads prefer the semantic tier over the durable one.
pub fn retrieval_order(priority: Priority) -> [Tier; 4] {
	if priority.is_urgent() {
		[Tier::FastCache, Tier::SemanticVector, Tier::DurablePersistent, Tier::ColdArchive]
	} else {
		[Tier::FastCache, Tier::DurablePersistent, Tier::SemanticVector, Tier::ColdArchive]
	}
}

fn now() -> std::time::Instant {
	tokio::time::Instant::now().into_std()
}
