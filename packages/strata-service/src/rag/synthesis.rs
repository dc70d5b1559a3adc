//! Synthesis modes. Each is a pure function of the ranked sources.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::rag::RagSource;
use strata_domain::rag::SynthesisMode;

const SUMMARY_SOURCES: usize = 5;

#[derive(Clone, Debug, Default, Serialize)]
pub struct StructureSummary {
	pub total: usize,
	/// Source counts keyed by source type.
	pub by_type: BTreeMap<String, usize>,
	pub min_confidence: Option<f32>,
	pub max_confidence: Option<f32>,
	#[serde(with = "time::serde::rfc3339::option")]
	pub earliest: Option<OffsetDateTime>,
	#[serde(with = "time::serde::rfc3339::option")]
	pub latest: Option<OffsetDateTime>,
	pub span_seconds: i64,
}

pub fn synthesize(
	mode: SynthesisMode,
	sources: &[RagSource],
	confidence_threshold: f32,
) -> String {
	match mode {
		SynthesisMode::Concatenation => concatenate(sources),
		SynthesisMode::Structured => structured(sources),
		SynthesisMode::Summarization => summarize(sources),
		SynthesisMode::Narrative => narrate(sources),
		SynthesisMode::Analytical => analyze(sources, confidence_threshold),
	}
}

pub fn structure(sources: &[RagSource]) -> StructureSummary {
	let mut summary = StructureSummary { total: sources.len(), ..Default::default() };

	for source in sources {
		*summary.by_type.entry(source.source_type()).or_default() += 1;

		let confidence = source.confidence;
		let created_at = source.created_at;

		summary.min_confidence =
			Some(summary.min_confidence.map_or(confidence, |min| min.min(confidence)));
		summary.max_confidence =
			Some(summary.max_confidence.map_or(confidence, |max| max.max(confidence)));
		summary.earliest = Some(summary.earliest.map_or(created_at, |at| at.min(created_at)));
		summary.latest = Some(summary.latest.map_or(created_at, |at| at.max(created_at)));
	}

	if let (Some(earliest), Some(latest)) = (summary.earliest, summary.latest) {
		summary.span_seconds = (latest - earliest).whole_seconds();
	}

	summary
}

/// First sentence of `text`, trimmed.
pub fn leading_sentence(text: &str) -> &str {
	text.unicode_sentences().map(str::trim).find(|sentence| !sentence.is_empty()).unwrap_or("")
}

fn concatenate(sources: &[RagSource]) -> String {
	sources.iter().map(|source| source.content.trim()).collect::<Vec<_>>().join("\n\n")
}

fn structured(sources: &[RagSource]) -> String {
	let mut groups = BTreeMap::<String, Vec<&RagSource>>::new();

	for source in sources {
		groups.entry(source.source_type()).or_default().push(source);
	}

	let mut groups = groups
		.into_iter()
		.map(|(source_type, members)| {
			let mean = members.iter().map(|source| source.relevance).sum::<f32>()
				/ members.len() as f32;

			(source_type, mean, members)
		})
		.collect::<Vec<_>>();

	groups.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

	let mut sections = Vec::with_capacity(groups.len());

	for (source_type, mean, members) in groups {
		let mut section =
			format!("## {source_type} ({} sources, mean relevance {mean:.2})", members.len());

		for source in members {
			section.push_str("\n- ");
			section.push_str(&single_line(&source.content));
		}

		sections.push(section);
	}

	sections.join("\n\n")
}

fn summarize(sources: &[RagSource]) -> String {
	sources
		.iter()
		.take(SUMMARY_SOURCES)
		.map(|source| leading_clause(&source.content))
		.filter(|clause| !clause.is_empty())
		.map(|clause| format!("{clause}."))
		.collect::<Vec<_>>()
		.join(" ")
}

fn narrate(sources: &[RagSource]) -> String {
	let mut ordered = sources.iter().collect::<Vec<_>>();

	ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

	ordered
		.into_iter()
		.map(|source| {
			format!("On {}, {}", source.created_at.date(), leading_sentence(&source.content))
		})
		.collect::<Vec<_>>()
		.join(" ")
}

fn analyze(sources: &[RagSource], confidence_threshold: f32) -> String {
	if sources.is_empty() {
		return "No sources matched.".to_string();
	}

	let summary = structure(sources);
	let mean_relevance =
		sources.iter().map(|source| source.relevance).sum::<f32>() / sources.len() as f32;
	let mut lines = vec![format!(
		"{} sources across {} types; mean relevance {:.2}; confidence {:.2} to {:.2}.",
		summary.total,
		summary.by_type.len(),
		mean_relevance,
		summary.min_confidence.unwrap_or_default(),
		summary.max_confidence.unwrap_or_default(),
	)];
	let highlights = sources
		.iter()
		.filter(|source| source.confidence >= confidence_threshold)
		.map(|source| format!("- {}", leading_sentence(&source.content)))
		.collect::<Vec<_>>();

	if highlights.is_empty() {
		lines.push(format!("No source reaches confidence {confidence_threshold:.2}."));
	} else {
		lines.push("High-confidence highlights:".to_string());
		lines.extend(highlights);
	}

	lines.join("\n")
}

fn leading_clause(text: &str) -> &str {
	let sentence = leading_sentence(text);
	let end = sentence.find([';', ':', '.', '!', '?']).unwrap_or(sentence.len());

	sentence[..end].trim()
}

fn single_line(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{rag::SourceOrigin, stores::StoreKind};
	use strata_domain::rag::RagDomain;
	use time::Duration;
	use uuid::Uuid;

	fn source(origin: SourceOrigin, content: &str, relevance: f32, age_days: i64) -> RagSource {
		RagSource {
			id: Uuid::new_v4(),
			origin,
			content: content.to_string(),
			item_type: None,
			domain: RagDomain::General,
			relevance,
			confidence: relevance,
			created_at: OffsetDateTime::now_utc() - Duration::days(age_days),
			score: relevance,
		}
	}

	fn fixture() -> Vec<RagSource> {
		vec![
			source(SourceOrigin::Vector, "Pools were resized; latency fell. Follow-up done.", 0.9, 1),
			source(
				SourceOrigin::Store(StoreKind::Patterns),
				"Size pools from measured load. Never guess.",
				0.4,
				3,
			),
			source(SourceOrigin::Store(StoreKind::Patterns), "Keep pools warm.", 0.5, 10),
		]
	}

	#[test]
	fn structured_groups_sort_by_mean_relevance() {
		let text = synthesize(SynthesisMode::Structured, &fixture(), 0.6);
		let vector = text.find("## vector").expect("Vector group must be present.");
		let patterns = text.find("## patterns").expect("Patterns group must be present.");

		assert!(vector < patterns);
		assert!(text.contains("## patterns (2 sources, mean relevance 0.45)"));
	}

	#[test]
	fn summarization_keeps_leading_clauses() {
		let text = synthesize(SynthesisMode::Summarization, &fixture(), 0.6);

		assert_eq!(text, "Pools were resized. Size pools from measured load. Keep pools warm.");
	}

	#[test]
	fn narrative_is_chronological() {
		let text = synthesize(SynthesisMode::Narrative, &fixture(), 0.6);
		let oldest = text.find("Keep pools warm.").expect("Oldest source must be present.");
		let newest = text.find("Pools were resized").expect("Newest source must be present.");

		assert!(text.starts_with("On "));
		assert!(oldest < newest);
	}

	#[test]
	fn analytical_lists_high_confidence_highlights() {
		let text = synthesize(SynthesisMode::Analytical, &fixture(), 0.6);

		assert!(text.starts_with("3 sources across 2 types;"));
		assert!(text.contains("- Pools were resized; latency fell."));
		assert!(!text.contains("- Keep pools warm."));
	}

	#[test]
	fn structure_reports_counts_and_ranges() {
		let summary = structure(&fixture());

		assert_eq!(summary.total, 3);
		assert_eq!(summary.by_type.get("patterns"), Some(&2));
		assert_eq!(summary.min_confidence, Some(0.4));
		assert_eq!(summary.max_confidence, Some(0.9));
		assert!(summary.span_seconds >= Duration::days(9).whole_seconds() - 1);
		assert_eq!(structure(&[]).total, 0);
	}
}
