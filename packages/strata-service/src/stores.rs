//! Category stores that index typed items through the storage façade.

use std::{
	collections::{BTreeMap, HashSet},
	fmt,
	sync::Arc,
};

use futures::future;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	Error, Result,
	facade::{SearchRequest, StorageFacade, StoreReceipt},
};
use strata_domain::{Context, Metadata, Priority, rag::RagDomain};
use strata_storage::BoxFuture;

const STORE_TAG_PREFIX: &str = "store:";
const TYPE_TAG_PREFIX: &str = "type:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
	Patterns,
	Executions,
	Knowledge,
	Conversations,
}
impl StoreKind {
	pub const ALL: [Self; 4] =
		[Self::Patterns, Self::Executions, Self::Knowledge, Self::Conversations];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Patterns => "patterns",
			Self::Executions => "executions",
			Self::Knowledge => "knowledge",
			Self::Conversations => "conversations",
		}
	}

	pub fn context(self) -> Context {
		match self {
			Self::Patterns => Context::Pattern,
			Self::Executions => Context::Execution,
			Self::Knowledge => Context::Knowledge,
			Self::Conversations => Context::Conversation,
		}
	}

	/// The RAG domain items of this store are filed under.
	pub fn domain(self) -> RagDomain {
		match self {
			Self::Patterns | Self::Executions => RagDomain::Technical,
			Self::Knowledge => RagDomain::General,
			Self::Conversations => RagDomain::Business,
		}
	}

	pub fn tag(self) -> String {
		format!("{STORE_TAG_PREFIX}{}", self.as_str())
	}
}
impl fmt::Display for StoreKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A typed item to index, such as a pattern, an execution log or a conversation turn.
#[derive(Clone, Debug, Deserialize)]
pub struct StoreItem {
	pub title: String,
	pub body: String,
	pub item_type: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub priority: Option<Priority>,
	#[serde(default)]
	pub confidence: Option<f32>,
	/// Rendered as `key: value` lines below the body.
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
}
impl StoreItem {
	pub fn new(
		title: impl Into<String>,
		body: impl Into<String>,
		item_type: impl Into<String>,
	) -> Self {
		Self {
			title: title.into(),
			body: body.into(),
			item_type: item_type.into(),
			tags: Vec::new(),
			priority: None,
			confidence: None,
			attributes: BTreeMap::new(),
		}
	}

	fn render(&self) -> String {
		let mut content = format!("{}\n\n{}", self.title.trim(), self.body.trim());

		for (key, value) in &self.attributes {
			content.push_str(&format!("\n{key}: {value}"));
		}

		content
	}
}

#[derive(Clone, Debug)]
pub struct StoreQuery {
	pub query: String,
	/// Empty means every item type.
	pub item_types: Vec<String>,
	pub max_results: usize,
	/// Drops hits filed under a different, non-general domain.
	pub domain: Option<RagDomain>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StoreHit {
	pub id: Uuid,
	pub store: StoreKind,
	pub content: String,
	pub metadata: Metadata,
	pub item_type: Option<String>,
	pub relevance: f32,
}

pub trait ContentStore
where
	Self: Send + Sync,
{
	fn kind(&self) -> StoreKind;

	fn search<'a>(&'a self, query: &'a StoreQuery) -> BoxFuture<'a, Result<Vec<StoreHit>>>;
}

pub struct CategoryStore {
	kind: StoreKind,
	facade: Arc<StorageFacade>,
}
impl CategoryStore {
	pub fn new(kind: StoreKind, facade: Arc<StorageFacade>) -> Self {
		Self { kind, facade }
	}

	pub async fn put(&self, item: StoreItem) -> Result<StoreReceipt> {
		if item.title.trim().is_empty() && item.body.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "item title or body must be non-empty.".to_string(),
			});
		}
		if item.item_type.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "item_type must be non-empty.".to_string(),
			});
		}

		let item_type = item.item_type.trim().to_ascii_lowercase();
		let mut tags = vec![self.kind.tag(), format!("{TYPE_TAG_PREFIX}{item_type}")];

		tags.extend(item.tags.iter().cloned());

		let priority = item.priority.unwrap_or(Priority::Standard);
		let metadata = Metadata::new(self.kind.context(), priority)
			.with_tags(tags)
			.with_domain(self.kind.domain().as_str())
			.with_confidence(item.confidence.unwrap_or(1.0));
		let receipt = self.facade.store(item.render(), metadata, None).await?;

		tracing::debug!(
			store = %self.kind,
			entry_id = %receipt.id,
			item_type = %item_type,
			"Indexed store item."
		);

		Ok(receipt)
	}

	/// Runs one tag-filtered search per requested item type so every filter applies before
	/// truncation.
	async fn find(&self, query: &StoreQuery) -> Result<Vec<StoreHit>> {
		if let Some(domain) = query.domain
			&& !domain_matches(domain, self.kind.domain())
		{
			return Ok(Vec::new());
		}

		let mut wanted = query
			.item_types
			.iter()
			.map(|item_type| item_type.trim().to_ascii_lowercase())
			.filter(|item_type| !item_type.is_empty())
			.collect::<Vec<_>>();

		wanted.sort();
		wanted.dedup();

		let type_filters =
			if wanted.is_empty() { vec![None] } else { wanted.into_iter().map(Some).collect() };
		let requests = type_filters
			.into_iter()
			.map(|item_type| {
				let mut request = SearchRequest::new(query.query.clone(), query.max_results);

				request.contexts = vec![self.kind.context()];
				request.tags = vec![self.kind.tag()];

				if let Some(item_type) = item_type {
					request.tags.push(format!("{TYPE_TAG_PREFIX}{item_type}"));
				}

				request
			})
			.collect::<Vec<_>>();
		let batches =
			future::join_all(requests.iter().map(|request| self.facade.search(request))).await;
		let mut results = Vec::new();

		for batch in batches {
			results.extend(batch?);
		}

		results.sort_by(|a, b| b.score.total_cmp(&a.score));

		let mut seen = HashSet::new();
		let hits = results
			.into_iter()
			.filter(|result| seen.insert(result.entry.id()))
			.filter(|result| {
				query.domain.is_none_or(|domain| domain_compatible(domain, &result.entry.metadata))
			})
			.take(query.max_results)
			.map(|result| {
				let metadata = result.entry.metadata;

				StoreHit {
					id: metadata.id(),
					store: self.kind,
					content: result.entry.content,
					item_type: item_type_of(&metadata),
					metadata,
					relevance: result.relevance,
				}
			})
			.collect();

		Ok(hits)
	}
}
impl ContentStore for CategoryStore {
	fn kind(&self) -> StoreKind {
		self.kind
	}

	fn search<'a>(&'a self, query: &'a StoreQuery) -> BoxFuture<'a, Result<Vec<StoreHit>>> {
		Box::pin(self.find(query))
	}
}

fn item_type_of(metadata: &Metadata) -> Option<String> {
	metadata.tags.iter().find_map(|tag| tag.strip_prefix(TYPE_TAG_PREFIX).map(str::to_string))
}

fn domain_compatible(wanted: RagDomain, metadata: &Metadata) -> bool {
	let filed = metadata.domain.as_deref().map(RagDomain::parse).unwrap_or_default();

	domain_matches(wanted, filed)
}

fn domain_matches(wanted: RagDomain, filed: RagDomain) -> bool {
	wanted == RagDomain::General || filed == RagDomain::General || filed == wanted
}
