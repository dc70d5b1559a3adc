use crate::{Context, Metadata, Tier};

pub const SEMANTIC_MIN_CHARS: usize = 50;
pub const SHORT_TTL_SECONDS: u64 = 3_600;

/// Default placement for an entry.
///
/// - Critical and high priority content is cached.
/// - Content longer than [`SEMANTIC_MIN_CHARS`] is indexed semantically unless it is system
///   content.
/// - Content is persisted unless it carries a ttl of at most [`SHORT_TTL_SECONDS`].
/// - Content that qualifies for nothing is cached.
pub fn default_tiers(content: &str, metadata: &Metadata) -> Vec<Tier> {
	let mut tiers = Vec::with_capacity(3);

	if metadata.priority.is_urgent() {
		tiers.push(Tier::FastCache);
	}
	if content.chars().count() > SEMANTIC_MIN_CHARS && metadata.context != Context::System {
		tiers.push(Tier::SemanticVector);
	}

	let short_lived = metadata.ttl_seconds.map(|ttl| ttl <= SHORT_TTL_SECONDS).unwrap_or(false);

	if !short_lived {
		tiers.push(Tier::DurablePersistent);
	}
	if tiers.is_empty() {
		tiers.push(Tier::FastCache);
	}

	tiers
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Priority;

	const LONG: &str = "Connection pools should be sized from measured concurrency, not guesses.";

	#[test]
	fn critical_short_content_is_cached_and_persisted() {
		let metadata = Metadata::new(Context::Knowledge, Priority::Critical);

		assert_eq!(
			default_tiers("0123456789", &metadata),
			vec![Tier::FastCache, Tier::DurablePersistent]
		);
	}

	#[test]
	fn long_content_is_indexed_semantically() {
		let metadata = Metadata::new(Context::Knowledge, Priority::Standard);

		assert_eq!(
			default_tiers(LONG, &metadata),
			vec![Tier::SemanticVector, Tier::DurablePersistent]
		);
	}

	#[test]
	fn system_content_skips_semantic_tier() {
		let metadata = Metadata::new(Context::System, Priority::Standard);

		assert_eq!(default_tiers(LONG, &metadata), vec![Tier::DurablePersistent]);
	}

	#[test]
	fn short_ttl_skips_persistence() {
		let metadata =
			Metadata::new(Context::Conversation, Priority::High).with_ttl_seconds(SHORT_TTL_SECONDS);

		assert_eq!(default_tiers("hi", &metadata), vec![Tier::FastCache]);
	}

	#[test]
	fn falls_back_to_cache_when_nothing_qualifies() {
		let metadata = Metadata::new(Context::System, Priority::Low).with_ttl_seconds(60);

		assert_eq!(default_tiers("tick", &metadata), vec![Tier::FastCache]);
	}
}
