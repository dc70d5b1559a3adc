use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{
	rag::{RagSource, SourceOrigin, synthesis},
	stores::StoreKind,
};
use strata_domain::{rag::RagDomain, text};

pub const INSIGHT_SOURCES: usize = 3;
pub const MAX_CROSS_REFERENCES: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CrossReference {
	pub left: Uuid,
	pub right: Uuid,
	pub shared_terms: Vec<String>,
}

/// Leading sentences of the most relevant sources, then notes specific to `domain`.
pub fn extract(
	sources: &[RagSource],
	domain: RagDomain,
	confidence_threshold: f32,
) -> Vec<String> {
	let mut by_relevance = sources.iter().collect::<Vec<_>>();

	by_relevance
		.sort_by(|a, b| b.relevance.total_cmp(&a.relevance).then_with(|| a.id.cmp(&b.id)));

	let mut insights = by_relevance
		.into_iter()
		.take(INSIGHT_SOURCES)
		.map(|source| synthesis::leading_sentence(&source.content).to_string())
		.filter(|sentence| !sentence.is_empty())
		.collect::<Vec<_>>();

	if sources.is_empty() {
		return insights;
	}

	let total = sources.len();

	match domain {
		RagDomain::Technical => {
			let count = count_from(sources, &[StoreKind::Patterns, StoreKind::Executions]);

			insights.push(format!("{count} of {total} sources come from patterns or executions."));
		},
		RagDomain::Business => {
			let count = count_from(sources, &[StoreKind::Conversations]);

			insights.push(format!("{count} of {total} sources come from conversations."));
		},
		RagDomain::General => {
			let types = sources.iter().map(RagSource::source_type).collect::<BTreeSet<_>>();

			insights.push(format!("Sources span {} types.", types.len()));
		},
	}

	let confident =
		sources.iter().filter(|source| source.confidence >= confidence_threshold).count();

	insights.push(format!(
		"{confident} of {total} sources meet confidence {confidence_threshold:.2}."
	));

	insights
}

/// Source pairs sharing at least `min_terms` significant terms, most overlap first.
pub fn cross_references(sources: &[RagSource], min_terms: usize) -> Vec<CrossReference> {
	let terms = sources
		.iter()
		.map(|source| text::significant_terms(&source.content))
		.collect::<Vec<_>>();
	let mut pairs = Vec::new();

	for (i, left) in terms.iter().enumerate() {
		for (j, right) in terms.iter().enumerate().skip(i + 1) {
			let shared = left.intersection(right).cloned().collect::<BTreeSet<_>>();

			if shared.len() >= min_terms.max(1) {
				pairs.push((i, j, shared.into_iter().collect::<Vec<_>>()));
			}
		}
	}

	pairs.sort_by(|a, b| b.2.len().cmp(&a.2.len()).then_with(|| (a.0, a.1).cmp(&(b.0, b.1))));
	pairs.truncate(MAX_CROSS_REFERENCES);

	pairs
		.into_iter()
		.map(|(i, j, shared_terms)| CrossReference {
			left: sources[i].id,
			right: sources[j].id,
			shared_terms,
		})
		.collect()
}

fn count_from(sources: &[RagSource], kinds: &[StoreKind]) -> usize {
	sources
		.iter()
		.filter(|source| {
			matches!(source.origin, SourceOrigin::Store(kind) if kinds.contains(&kind))
		})
		.count()
}

#[cfg(test)]
mod tests {
	use super::*;
	use time::OffsetDateTime;

	fn source(origin: SourceOrigin, content: &str, relevance: f32) -> RagSource {
		RagSource {
			id: Uuid::new_v4(),
			origin,
			content: content.to_string(),
			item_type: None,
			domain: RagDomain::General,
			relevance,
			confidence: 0.8,
			created_at: OffsetDateTime::now_utc(),
			score: relevance,
		}
	}

	#[test]
	fn shared_significant_terms_create_cross_references() {
		let pooling = source(
			SourceOrigin::Vector,
			"Database connection pooling reduces latency under load.",
			0.9,
		);
		let resize = source(
			SourceOrigin::Store(StoreKind::Executions),
			"Resized the database connection pooling settings.",
			0.7,
		);
		let filler_a = source(SourceOrigin::Vector, "It was the one that we had.", 0.5);
		let filler_b = source(SourceOrigin::Vector, "That was what we did with it.", 0.4);
		let refs = cross_references(&[pooling.clone(), resize.clone(), filler_a, filler_b], 3);

		assert_eq!(refs.len(), 1);
		assert_eq!((refs[0].left, refs[0].right), (pooling.id, resize.id));
		assert_eq!(refs[0].shared_terms, vec!["connection", "database", "pooling"]);
	}

	#[test]
	fn cross_references_are_capped() {
		let sources = (0..5)
			.map(|_| source(SourceOrigin::Vector, "alpha bravo charlie delta", 0.5))
			.collect::<Vec<_>>();

		assert_eq!(cross_references(&sources, 3).len(), MAX_CROSS_REFERENCES);
	}

	#[test]
	fn insights_lead_with_top_sources_then_domain_notes() {
		let sources = vec![
			source(SourceOrigin::Store(StoreKind::Patterns), "Pin pool sizes. Then measure.", 0.6),
			source(SourceOrigin::Vector, "Latency dropped after tuning. Details follow.", 0.9),
		];
		let insights = extract(&sources, RagDomain::Technical, 0.7);

		assert_eq!(insights[0], "Latency dropped after tuning.");
		assert_eq!(insights[1], "Pin pool sizes.");
		assert_eq!(insights[2], "1 of 2 sources come from patterns or executions.");
		assert_eq!(insights[3], "2 of 2 sources meet confidence 0.70.");
		assert!(extract(&[], RagDomain::Business, 0.7).is_empty());
	}
}
