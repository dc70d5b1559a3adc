use std::collections::HashSet;

pub const STOPWORDS: &[&str] = &[
	"a", "about", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at", "be",
	"been", "before", "being", "but", "by", "can", "could", "did", "do", "does", "doing", "for",
	"from", "had", "has", "have", "having", "he", "her", "here", "him", "his", "how", "if", "in",
	"into", "is", "it", "its", "just", "may", "me", "more", "most", "my", "no", "not", "now", "of",
	"on", "once", "only", "or", "other", "our", "out", "over", "she", "should", "so", "some",
	"such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
	"those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
	"when", "where", "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Lowercased ASCII alphanumeric tokens of at least two characters, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_ascii_alphanumeric() {
			normalized.push(ch.to_ascii_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	normalized.split_whitespace().filter(|token| token.len() >= 2).map(str::to_string).collect()
}

pub fn is_stopword(token: &str) -> bool {
	STOPWORDS.binary_search(&token).is_ok()
}

/// Distinct non-stopword tokens of at least three characters.
pub fn significant_terms(text: &str) -> HashSet<String> {
	tokenize(text).into_iter().filter(|token| token.len() >= 3 && !is_stopword(token)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stopwords_are_sorted_for_binary_search() {
		let mut sorted = STOPWORDS.to_vec();

		sorted.sort_unstable();

		assert_eq!(sorted, STOPWORDS);
	}

	#[test]
	fn tokenizes_on_non_alphanumerics() {
		assert_eq!(tokenize("Pool-size: 32, ok?"), vec!["pool", "size", "32", "ok"]);
	}

	#[test]
	fn significant_terms_drop_stopwords() {
		let terms = significant_terms("The pool and the database were tuned");

		assert!(terms.contains("pool"));
		assert!(terms.contains("database"));
		assert!(terms.contains("tuned"));
		assert!(!terms.contains("the"));
		assert!(!terms.contains("were"));
	}
}
