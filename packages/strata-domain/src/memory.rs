use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Tier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
	Intelligence,
	Execution,
	Pattern,
	Knowledge,
	Conversation,
	System,
}
impl Context {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Intelligence => "intelligence",
			Self::Execution => "execution",
			Self::Pattern => "pattern",
			Self::Knowledge => "knowledge",
			Self::Conversation => "conversation",
			Self::System => "system",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	Critical,
	High,
	Standard,
	Low,
}
impl Priority {
	/// Larger is more urgent.
	pub fn rank(self) -> u8 {
		match self {
			Self::Critical => 4,
			Self::High => 3,
			Self::Standard => 2,
			Self::Low => 1,
		}
	}

	pub fn is_urgent(self) -> bool {
		matches!(self, Self::Critical | Self::High)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Critical => "critical",
			Self::High => "high",
			Self::Standard => "standard",
			Self::Low => "low",
		}
	}
}

/// Opaque handle a backend returns for a stored copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationToken(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
	id: Uuid,
	pub context: Context,
	pub priority: Priority,
	#[serde(default)]
	pub tags: BTreeSet<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	updated_at: OffsetDateTime,
	#[serde(default)]
	pub access_count: u64,
	#[serde(default)]
	pub ttl_seconds: Option<u64>,
	#[serde(default)]
	pub domain: Option<String>,
	pub confidence: f32,
	#[serde(default)]
	pub owner_id: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
}
impl Metadata {
	pub fn new(context: Context, priority: Priority) -> Self {
		let now = OffsetDateTime::now_utc();

		Self {
			id: Uuid::new_v4(),
			context,
			priority,
			tags: BTreeSet::new(),
			created_at: now,
			updated_at: now,
			access_count: 0,
			ttl_seconds: None,
			domain: None,
			confidence: 1.0,
			owner_id: None,
			session_id: None,
		}
	}

	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn updated_at(&self) -> OffsetDateTime {
		self.updated_at
	}

	pub fn with_tags<I, S>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tags.extend(tags.into_iter().map(Into::into));

		self
	}

	pub fn with_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
		self.ttl_seconds = Some(ttl_seconds);

		self
	}

	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	pub fn with_confidence(mut self, confidence: f32) -> Self {
		self.confidence = confidence.clamp(0.0, 1.0);

		self
	}

	pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
		self.owner_id = Some(owner_id.into());

		self
	}

	pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());

		self
	}

	/// Moves `updated_at` forward. Never moves it backwards.
	pub fn touch(&mut self, now: OffsetDateTime) {
		if now > self.updated_at {
			self.updated_at = now;
		}
	}

	pub fn record_access(&mut self) {
		self.access_count = self.access_count.saturating_add(1);
	}

	/// Applies every field present in `patch`, keeping identity, creation time and access
	/// history.
	pub fn apply(&mut self, patch: &MetadataPatch) {
		if let Some(context) = patch.context {
			self.context = context;
		}
		if let Some(priority) = patch.priority {
			self.priority = priority;
		}
		if let Some(tags) = patch.tags.as_ref() {
			self.tags = tags.clone();
		}
		if let Some(ttl_seconds) = patch.ttl_seconds {
			self.ttl_seconds = (ttl_seconds > 0).then_some(ttl_seconds);
		}
		if let Some(domain) = patch.domain.as_ref() {
			self.domain = Some(domain.clone());
		}
		if let Some(confidence) = patch.confidence {
			self.confidence = confidence.clamp(0.0, 1.0);
		}
		if let Some(owner_id) = patch.owner_id.as_ref() {
			self.owner_id = Some(owner_id.clone());
		}
		if let Some(session_id) = patch.session_id.as_ref() {
			self.session_id = Some(session_id.clone());
		}
	}
}

/// Caller-editable metadata fields. Absent fields are left untouched; a `ttl_seconds` of zero
/// clears the lifetime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataPatch {
	#[serde(default)]
	pub context: Option<Context>,
	#[serde(default)]
	pub priority: Option<Priority>,
	#[serde(default)]
	pub tags: Option<BTreeSet<String>>,
	#[serde(default)]
	pub ttl_seconds: Option<u64>,
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub confidence: Option<f32>,
	#[serde(default)]
	pub owner_id: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
}
impl MetadataPatch {
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
	pub content: String,
	pub metadata: Metadata,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
	#[serde(default)]
	pub locations: BTreeMap<Tier, LocationToken>,
}
impl Entry {
	pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
		Self { content: content.into(), metadata, embedding: None, locations: BTreeMap::new() }
	}

	pub fn id(&self) -> Uuid {
		self.metadata.id()
	}

	pub fn with_embedding(mut self, embedding: Option<Vec<f32>>) -> Self {
		self.embedding = embedding;

		self
	}
}

#[cfg(test)]
mod tests {
	use time::Duration;

	use super::*;

	#[test]
	fn ids_are_unique_per_metadata() {
		let a = Metadata::new(Context::Knowledge, Priority::Standard);
		let b = Metadata::new(Context::Knowledge, Priority::Standard);

		assert_ne!(a.id(), b.id());
	}

	#[test]
	fn touch_is_monotonic() {
		let mut metadata = Metadata::new(Context::System, Priority::Low);
		let original = metadata.updated_at();

		metadata.touch(original - Duration::hours(1));

		assert_eq!(metadata.updated_at(), original);

		metadata.touch(original + Duration::seconds(5));

		assert_eq!(metadata.updated_at(), original + Duration::seconds(5));
	}

	#[test]
	fn patch_keeps_identity_and_history() {
		let mut stored = Metadata::new(Context::Pattern, Priority::Low).with_ttl_seconds(60);
		let id = stored.id();

		stored.record_access();

		let patch = MetadataPatch {
			context: Some(Context::Knowledge),
			tags: Some(BTreeSet::from(["db".to_string()])),
			ttl_seconds: Some(0),
			..Default::default()
		};

		stored.apply(&patch);

		assert_eq!(stored.id(), id);
		assert_eq!(stored.context, Context::Knowledge);
		assert_eq!(stored.priority, Priority::Low);
		assert_eq!(stored.access_count, 1);
		assert_eq!(stored.ttl_seconds, None);
		assert!(stored.tags.contains("db"));
		assert!(!patch.is_empty());
		assert!(MetadataPatch::default().is_empty());
	}

	#[test]
	fn entry_round_trips_through_json() {
		let mut entry = Entry::new(
			"connection pool sizing",
			Metadata::new(Context::Knowledge, Priority::High).with_domain("technical"),
		);

		entry.locations.insert(Tier::FastCache, LocationToken("cache:1".to_string()));

		let raw = serde_json::to_string(&entry).expect("Failed to encode entry.");
		let decoded: Entry = serde_json::from_str(&raw).expect("Failed to decode entry.");

		assert_eq!(decoded.id(), entry.id());
		assert_eq!(decoded.locations.get(&Tier::FastCache), entry.locations.get(&Tier::FastCache));
	}
}
