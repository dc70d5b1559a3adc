use std::{
	collections::HashMap,
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::json;
use uuid::Uuid;

use strata_domain::{Entry, LocationToken, Tier};
use strata_storage::{
	BoxFuture, Error as TierError, HealthReport, Result as TierResult, TierBackend, TierHit,
	TierQuery, backend::rank_lexically,
};

#[derive(Debug, Default)]
struct Script {
	fail_next: u32,
	fail_always: bool,
	unhealthy: bool,
	latency: Duration,
	relevance: Option<f32>,
}

/// Per-operation call counts.
#[derive(Debug, Default)]
pub struct Calls {
	pub stores: AtomicUsize,
	pub retrieves: AtomicUsize,
	pub searches: AtomicUsize,
	pub deletes: AtomicUsize,
	pub probes: AtomicUsize,
}
impl Calls {
	pub fn stores(&self) -> usize {
		self.stores.load(Ordering::SeqCst)
	}

	pub fn retrieves(&self) -> usize {
		self.retrieves.load(Ordering::SeqCst)
	}

	pub fn searches(&self) -> usize {
		self.searches.load(Ordering::SeqCst)
	}

	pub fn deletes(&self) -> usize {
		self.deletes.load(Ordering::SeqCst)
	}

	pub fn probes(&self) -> usize {
		self.probes.load(Ordering::SeqCst)
	}
}

/// In-memory tier whose failures, latency and health are driven by the test.
pub struct ScriptedTier {
	tier: Tier,
	entries: Mutex<HashMap<Uuid, Entry>>,
	script: Mutex<Script>,
	pub calls: Calls,
}
impl ScriptedTier {
	pub fn new(tier: Tier) -> Self {
		Self {
			tier,
			entries: Mutex::new(HashMap::new()),
			script: Mutex::new(Script::default()),
			calls: Calls::default(),
		}
	}

	/// The next `count` data operations fail. Probes are unaffected.
	pub fn fail_next(&self, count: u32) {
		self.script().fail_next = count;
	}

	pub fn fail_always(&self, fail: bool) {
		self.script().fail_always = fail;
	}

	/// Probes report the tier as down while set.
	pub fn set_unhealthy(&self, unhealthy: bool) {
		self.script().unhealthy = unhealthy;
	}

	/// Applied to every data operation and probe.
	pub fn set_latency(&self, latency: Duration) {
		self.script().latency = latency;
	}

	/// Overrides the lexical relevance of every search hit.
	pub fn set_relevance(&self, relevance: Option<f32>) {
		self.script().relevance = relevance;
	}

	pub fn insert(&self, entry: Entry) {
		self.entries().insert(entry.id(), entry);
	}

	pub fn contains(&self, id: Uuid) -> bool {
		self.entries().contains_key(&id)
	}

	pub fn get(&self, id: Uuid) -> Option<Entry> {
		self.entries().get(&id).cloned()
	}

	pub fn len(&self) -> usize {
		self.entries().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn script(&self) -> std::sync::MutexGuard<'_, Script> {
		self.script.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner())
	}

	async fn begin(&self, counter: &AtomicUsize) -> TierResult<()> {
		counter.fetch_add(1, Ordering::SeqCst);

		let (latency, fail) = {
			let mut script = self.script();
			let fail = if script.fail_always {
				true
			} else if script.fail_next > 0 {
				script.fail_next -= 1;

				true
			} else {
				false
			};

			(script.latency, fail)
		};

		if !latency.is_zero() {
			tokio::time::sleep(latency).await;
		}
		if fail {
			return Err(TierError::Unavailable {
				tier: self.tier,
				message: "Scripted failure.".to_string(),
			});
		}

		Ok(())
	}
}
impl TierBackend for ScriptedTier {
	fn tier(&self) -> Tier {
		self.tier
	}

	fn location(&self, id: Uuid) -> LocationToken {
		LocationToken(format!("{}:{id}", self.tier))
	}

	fn store<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, TierResult<LocationToken>> {
		Box::pin(async move {
			self.begin(&self.calls.stores).await?;
			self.insert(entry.clone());

			Ok(self.location(entry.id()))
		})
	}

	fn retrieve<'a>(&'a self, id: Uuid) -> BoxFuture<'a, TierResult<Option<Entry>>> {
		Box::pin(async move {
			self.begin(&self.calls.retrieves).await?;

			Ok(self.get(id))
		})
	}

	fn search<'a>(&'a self, query: &'a TierQuery) -> BoxFuture<'a, TierResult<Vec<TierHit>>> {
		Box::pin(async move {
			self.begin(&self.calls.searches).await?;

			let entries = self.entries().values().cloned().collect::<Vec<_>>();
			let mut hits = rank_lexically(query, entries);

			if let Some(relevance) = self.script().relevance {
				for hit in &mut hits {
					hit.relevance = relevance;
				}
			}

			Ok(hits)
		})
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, TierResult<bool>> {
		Box::pin(async move {
			self.begin(&self.calls.deletes).await?;

			Ok(self.entries().remove(&id).is_some())
		})
	}

	fn health_check<'a>(&'a self) -> BoxFuture<'a, TierResult<HealthReport>> {
		Box::pin(async move {
			self.calls.probes.fetch_add(1, Ordering::SeqCst);

			let (latency, unhealthy) = {
				let script = self.script();

				(script.latency, script.unhealthy)
			};

			if !latency.is_zero() {
				tokio::time::sleep(latency).await;
			}
			if unhealthy {
				return Err(TierError::Unavailable {
					tier: self.tier,
					message: "Scripted outage.".to_string(),
				});
			}

			Ok(HealthReport::available(json!({ "entries": self.len() })))
		})
	}
}
