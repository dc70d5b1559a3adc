use std::collections::HashSet;

use serde_json::Value;
use uuid::Uuid;

use crate::Result;
use strata_domain::{Context, Entry, LocationToken, Tier, text};

pub use strata_providers::BoxFuture;

/// Contract every tier backend implements.
///
/// Backends report failures through `Err`; callers above the tier boundary turn those into
/// data and never let them escape.
pub trait TierBackend
where
	Self: Send + Sync,
{
	fn tier(&self) -> Tier;

	/// The token this tier hands out for `id`; stable across stores of the same entry.
	fn location(&self, id: Uuid) -> LocationToken;

	fn store<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<LocationToken>>;

	fn retrieve<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Entry>>>;

	fn search<'a>(&'a self, query: &'a TierQuery) -> BoxFuture<'a, Result<Vec<TierHit>>>;

	/// `Ok(false)` when the tier held no copy.
	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>>;

	fn health_check<'a>(&'a self) -> BoxFuture<'a, Result<HealthReport>>;
}

#[derive(Clone, Debug, Default)]
pub struct TierQuery {
	pub text: String,
	pub max_results: usize,
	/// Empty means any context.
	pub contexts: Vec<Context>,
	/// Every listed tag must be present.
	pub tags: Vec<String>,
	pub domain: Option<String>,
	pub embedding: Option<Vec<f32>>,
}
impl TierQuery {
	pub fn new(text: impl Into<String>, max_results: usize) -> Self {
		Self { text: text.into(), max_results, ..Default::default() }
	}

	pub fn accepts(&self, entry: &Entry) -> bool {
		let metadata = &entry.metadata;

		if !self.contexts.is_empty() && !self.contexts.contains(&metadata.context) {
			return false;
		}
		if !self.tags.iter().all(|tag| metadata.tags.contains(tag)) {
			return false;
		}

		match self.domain.as_deref() {
			Some(domain) => metadata.domain.as_deref() == Some(domain),
			None => true,
		}
	}
}

#[derive(Clone, Debug)]
pub struct TierHit {
	pub entry: Entry,
	/// In `[0, 1]`.
	pub relevance: f32,
}

#[derive(Clone, Debug)]
pub struct HealthReport {
	pub available: bool,
	pub diagnostics: Value,
}
impl HealthReport {
	pub fn available(diagnostics: Value) -> Self {
		Self { available: true, diagnostics }
	}
}

/// Share of distinct query tokens that occur in `content`.
pub fn lexical_relevance(query_tokens: &[String], content: &str) -> f32 {
	if query_tokens.is_empty() {
		return 0.0;
	}

	let content_tokens = text::tokenize(content).into_iter().collect::<HashSet<_>>();
	let distinct = query_tokens.iter().collect::<HashSet<_>>();
	let matched = distinct.iter().filter(|token| content_tokens.contains(token.as_str())).count();

	matched as f32 / distinct.len() as f32
}

/// Ranks entries lexically against `query`, dropping non-matching ones.
pub fn rank_lexically<I>(query: &TierQuery, entries: I) -> Vec<TierHit>
where
	I: IntoIterator<Item = Entry>,
{
	let tokens = text::tokenize(&query.text);
	let mut hits = entries
		.into_iter()
		.filter(|entry| query.accepts(entry))
		.filter_map(|entry| {
			let relevance = lexical_relevance(&tokens, &entry.content);

			(relevance > 0.0).then_some(TierHit { entry, relevance })
		})
		.collect::<Vec<_>>();

	hits.sort_by(|a, b| {
		b.relevance.total_cmp(&a.relevance).then_with(|| a.entry.id().cmp(&b.entry.id()))
	});
	hits.truncate(query.max_results);

	hits
}
