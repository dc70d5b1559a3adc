use strata_config::Rag;
use strata_domain::{
	rag::{RagDomain, RetrievalStrategy},
	text,
};

use crate::stores::StoreKind;

pub const KEYWORD_MAX_TERMS: usize = 3;
pub const SEMANTIC_MIN_TERMS: usize = 15;

/// Picks a retrieval strategy and says why.
///
/// Short queries go to keyword search and long ones to semantic search. Queries that mention a
/// domain term go to the specialized stores. Everything else is hybrid.
pub fn choose(query: &str, domain: RagDomain, cfg: &Rag) -> (RetrievalStrategy, String) {
	if !cfg.adaptive_strategy {
		return (cfg.default_strategy, "Adaptive selection is disabled.".to_string());
	}

	let tokens = text::tokenize(query);

	if tokens.len() < KEYWORD_MAX_TERMS {
		return (
			RetrievalStrategy::Keyword,
			format!("Query has {} terms, fewer than {KEYWORD_MAX_TERMS}.", tokens.len()),
		);
	}
	if tokens.len() > SEMANTIC_MIN_TERMS {
		return (
			RetrievalStrategy::Semantic,
			format!("Query has {} terms, more than {SEMANTIC_MIN_TERMS}.", tokens.len()),
		);
	}
	if let Some(term) = tokens.iter().find(|token| is_domain_term(token, domain, cfg)) {
		return (
			RetrievalStrategy::Specialized,
			format!("Query mentions the {} term {term:?}.", domain.as_str()),
		);
	}

	(RetrievalStrategy::Hybrid, "No domain terms matched.".to_string())
}

/// Stores consulted by `strategy`. Specialized retrieval keeps the stores filed under `domain`.
pub fn stores_for(strategy: RetrievalStrategy, domain: RagDomain) -> Vec<StoreKind> {
	if !strategy.uses_content_stores() {
		return Vec::new();
	}
	if strategy == RetrievalStrategy::Specialized && domain != RagDomain::General {
		return StoreKind::ALL.into_iter().filter(|kind| kind.domain() == domain).collect();
	}

	StoreKind::ALL.to_vec()
}

fn is_domain_term(token: &str, domain: RagDomain, cfg: &Rag) -> bool {
	let matches = |terms: &[String]| terms.iter().any(|term| term.eq_ignore_ascii_case(token));

	match domain {
		RagDomain::Technical => matches(&cfg.technical_terms),
		RagDomain::Business => matches(&cfg.business_terms),
		RagDomain::General => matches(&cfg.technical_terms) || matches(&cfg.business_terms),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn adaptive_choice_follows_query_shape() {
		let cfg = Rag::default();
		let technical = RagDomain::Technical;

		assert_eq!(choose("pools", technical, &cfg).0, RetrievalStrategy::Keyword);
		assert_eq!(
			choose("optimize database connection pooling", technical, &cfg).0,
			RetrievalStrategy::Specialized
		);
		assert_eq!(
			choose("what happened during the last team offsite", technical, &cfg).0,
			RetrievalStrategy::Hybrid
		);

		let long = "one two three four five six seven eight nine ten eleven twelve thirteen \
		            fourteen fifteen sixteen";

		assert_eq!(choose(long, technical, &cfg).0, RetrievalStrategy::Semantic);
	}

	#[test]
	fn business_terms_do_not_specialize_technical_queries() {
		let cfg = Rag::default();

		assert_eq!(
			choose("quarter revenue growth plan", RagDomain::Technical, &cfg).0,
			RetrievalStrategy::Hybrid
		);
		assert_eq!(
			choose("quarter revenue growth plan", RagDomain::Business, &cfg).0,
			RetrievalStrategy::Specialized
		);
	}

	#[test]
	fn disabled_adaptation_uses_the_default() {
		let cfg = Rag {
			adaptive_strategy: false,
			default_strategy: RetrievalStrategy::Semantic,
			..Rag::default()
		};

		assert_eq!(choose("pools", RagDomain::General, &cfg).0, RetrievalStrategy::Semantic);
	}

	#[test]
	fn specialized_retrieval_narrows_stores_to_the_domain() {
		assert_eq!(
			stores_for(RetrievalStrategy::Specialized, RagDomain::Technical),
			vec![StoreKind::Patterns, StoreKind::Executions]
		);
		assert_eq!(
			stores_for(RetrievalStrategy::Specialized, RagDomain::Business),
			vec![StoreKind::Conversations]
		);
		assert_eq!(stores_for(RetrievalStrategy::Hybrid, RagDomain::Business).len(), 4);
		assert!(stores_for(RetrievalStrategy::Semantic, RagDomain::General).is_empty());
	}
}
