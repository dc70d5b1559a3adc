use std::{cmp::Ordering, collections::HashSet};

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::rag::RagSource;
use strata_domain::rag::RagDomain;

/// Leading characters hashed to detect near-duplicates.
pub const NEAR_DUPLICATE_PREFIX_CHARS: usize = 160;
pub const DOMAIN_MATCH_WEIGHT: f32 = 1.3;
pub const DOMAIN_MISMATCH_WEIGHT: f32 = 0.8;
pub const FRESH_BOOST: f32 = 1.2;
pub const STALE_PENALTY: f32 = 0.9;

const FRESH_WINDOW: Duration = Duration::hours(24);
const STALE_AFTER: Duration = Duration::days(7);

/// Drops repeated ids and near-duplicate content, keeping the most relevant copy.
///
/// The output is ordered by relevance, so applying this twice changes nothing.
pub fn dedupe(mut sources: Vec<RagSource>) -> Vec<RagSource> {
	sources.sort_by(|a, b| by_relevance(a, b));

	let mut ids = HashSet::<Uuid>::new();
	let mut prefixes = HashSet::<blake3::Hash>::new();

	sources.retain(|source| {
		let key = near_duplicate_key(&source.content);

		if ids.contains(&source.id) || prefixes.contains(&key) {
			return false;
		}

		ids.insert(source.id);
		prefixes.insert(key);

		true
	});

	sources
}

/// Hash of the case- and whitespace-normalized leading content.
pub fn near_duplicate_key(content: &str) -> blake3::Hash {
	let normalized = content
		.split_whitespace()
		.flat_map(|word| word.chars().chain([' ']))
		.flat_map(char::to_lowercase)
		.take(NEAR_DUPLICATE_PREFIX_CHARS)
		.collect::<String>();

	blake3::hash(normalized.trim_end().as_bytes())
}

pub fn domain_weight(active: RagDomain, source: RagDomain) -> f32 {
	if active == RagDomain::General || source == RagDomain::General {
		1.0
	} else if active == source {
		DOMAIN_MATCH_WEIGHT
	} else {
		DOMAIN_MISMATCH_WEIGHT
	}
}

pub fn recency_factor(created_at: OffsetDateTime, now: OffsetDateTime) -> f32 {
	let age = now - created_at;

	if age < FRESH_WINDOW {
		FRESH_BOOST
	} else if age > STALE_AFTER {
		STALE_PENALTY
	} else {
		1.0
	}
}

pub fn score(source: &RagSource, active: RagDomain, now: OffsetDateTime) -> f32 {
	source.relevance
		* source.confidence
		* domain_weight(active, source.domain)
		* recency_factor(source.created_at, now)
}

/// Dedupes, drops weak sources, scores the rest and keeps the best `max_sources`.
pub fn rank(
	sources: Vec<RagSource>,
	active: RagDomain,
	min_relevance: f32,
	max_sources: usize,
	now: OffsetDateTime,
) -> Vec<RagSource> {
	let mut ranked = dedupe(sources)
		.into_iter()
		.filter(|source| source.relevance >= min_relevance)
		.map(|mut source| {
			source.score = score(&source, active, now);

			source
		})
		.collect::<Vec<_>>();

	ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
	ranked.truncate(max_sources);

	ranked
}

fn by_relevance(a: &RagSource, b: &RagSource) -> Ordering {
	b.relevance.total_cmp(&a.relevance).then_with(|| a.id.cmp(&b.id))
}
