use std::{
	collections::{BTreeMap, HashMap},
	sync::Mutex,
	time::Duration,
};

use serde_json::json;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
	BoxFuture, HealthReport, Result, TierBackend, TierHit, TierQuery, backend::rank_lexically,
};
use strata_config::TtlSeconds;
use strata_domain::{Entry, LocationToken, Tier};

struct Slot {
	entry: Entry,
	seq: u64,
	expires_at: Option<Instant>,
}
impl Slot {
	fn is_live(&self, now: Instant) -> bool {
		self.expires_at.is_none_or(|deadline| now < deadline)
	}
}

#[derive(Default)]
struct CacheState {
	slots: HashMap<Uuid, Slot>,
	/// Insertion order, oldest first.
	order: BTreeMap<u64, Uuid>,
	next_seq: u64,
	evictions: u64,
	expirations: u64,
}
impl CacheState {
	fn remove(&mut self, id: Uuid) -> Option<Slot> {
		let slot = self.slots.remove(&id)?;

		self.order.remove(&slot.seq);

		Some(slot)
	}

	fn purge_expired(&mut self, now: Instant) {
		let expired = self
			.slots
			.iter()
			.filter(|(_, slot)| !slot.is_live(now))
			.map(|(id, _)| *id)
			.collect::<Vec<_>>();

		for id in expired {
			self.remove(id);

			self.expirations += 1;
		}
	}
}

/// In-process fast tier with per-entry expiry and a fixed capacity.
///
/// When full, the oldest insertion is evicted first.
pub struct CacheTier {
	capacity: usize,
	ttl: TtlSeconds,
	state: Mutex<CacheState>,
}
impl CacheTier {
	pub fn new(capacity: usize, ttl: TtlSeconds) -> Self {
		Self { capacity: capacity.max(1), ttl, state: Mutex::new(CacheState::default()) }
	}

	pub fn from_config(cfg: &strata_config::Config) -> Self {
		Self::new(cfg.tiers.cache.capacity, cfg.ttl.clone())
	}

	pub fn len(&self) -> usize {
		let now = Instant::now();
		let state = self.lock();

		state.slots.values().filter(|slot| slot.is_live(now)).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Explicit entry lifetime wins over the per-priority default.
	pub fn ttl_for(&self, entry: &Entry) -> Option<Duration> {
		let seconds = match entry.metadata.ttl_seconds {
			Some(0) => None,
			Some(seconds) => Some(seconds),
			None => self.ttl.for_priority(entry.metadata.priority),
		};

		seconds.map(Duration::from_secs)
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn insert(&self, entry: &Entry) -> LocationToken {
		let now = Instant::now();
		let expires_at = self.ttl_for(entry).map(|ttl| now + ttl);
		let id = entry.id();
		let mut state = self.lock();

		state.remove(id);
		state.purge_expired(now);

		while state.slots.len() >= self.capacity {
			let Some((_, oldest)) = state.order.pop_first() else {
				break;
			};

			state.slots.remove(&oldest);

			state.evictions += 1;
		}

		let seq = state.next_seq;

		state.next_seq += 1;
		state.order.insert(seq, id);
		state.slots.insert(id, Slot { entry: entry.clone(), seq, expires_at });

		self.location(id)
	}

	fn get(&self, id: Uuid) -> Option<Entry> {
		let now = Instant::now();
		let mut state = self.lock();
		let live = state.slots.get(&id).map(|slot| slot.is_live(now))?;

		if !live {
			state.remove(id);

			state.expirations += 1;

			return None;
		}

		state.slots.get(&id).map(|slot| slot.entry.clone())
	}

	fn scan(&self, query: &TierQuery) -> Vec<TierHit> {
		let now = Instant::now();
		let candidates = {
			let mut state = self.lock();

			state.purge_expired(now);
			state.slots.values().map(|slot| slot.entry.clone()).collect::<Vec<_>>()
		};

		rank_lexically(query, candidates)
	}

	fn report(&self) -> HealthReport {
		let state = self.lock();

		HealthReport::available(json!({
			"entries": state.slots.len(),
			"capacity": self.capacity,
			"evictions": state.evictions,
			"expirations": state.expirations,
		}))
	}
}
impl TierBackend for CacheTier {
	fn tier(&self) -> Tier {
		Tier::FastCache
	}

	fn location(&self, id: Uuid) -> LocationToken {
		LocationToken(format!("cache:{id}"))
	}

	fn store<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<LocationToken>> {
		Box::pin(async move { Ok(self.insert(entry)) })
	}

	fn retrieve<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Entry>>> {
		Box::pin(async move { Ok(self.get(id)) })
	}

	fn search<'a>(&'a self, query: &'a TierQuery) -> BoxFuture<'a, Result<Vec<TierHit>>> {
		Box::pin(async move { Ok(self.scan(query)) })
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(self.lock().remove(id).is_some()) })
	}

	fn health_check<'a>(&'a self) -> BoxFuture<'a, Result<HealthReport>> {
		Box::pin(async move { Ok(self.report()) })
	}
}
