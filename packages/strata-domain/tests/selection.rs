use strata_domain::{
	Context, Metadata, Priority, Tier,
	routing::{RoutingStrategy, RuleCondition, RuleSet, RuleSubject, RoutingRule},
	selection,
};

#[test]
fn intelligent_strategy_is_the_default_heuristic() {
	let samples = [
		("0123456789", Metadata::new(Context::Knowledge, Priority::Critical)),
		("0123456789", Metadata::new(Context::System, Priority::Low).with_ttl_seconds(30)),
		(
			"A long explanation of how the connection pool recycles idle sockets over time.",
			Metadata::new(Context::Pattern, Priority::Standard),
		),
	];

	for (content, metadata) in &samples {
		assert_eq!(
			RoutingStrategy::Intelligent.candidate_tiers(content, metadata),
			selection::default_tiers(content, metadata)
		);
	}
}

#[test]
fn critical_short_content_placement() {
	let metadata = Metadata::new(Context::Knowledge, Priority::Critical);

	assert_eq!(
		RoutingStrategy::default().candidate_tiers("0123456789", &metadata),
		vec![Tier::FastCache, Tier::DurablePersistent]
	);
	// Explicit strategies are operator overrides and may disagree.
	assert_eq!(
		RoutingStrategy::PerformanceFirst.candidate_tiers("0123456789", &metadata),
		vec![Tier::FastCache, Tier::SemanticVector, Tier::DurablePersistent]
	);
}

#[test]
fn matching_rule_replaces_strategy_output() {
	let mut rules = RuleSet::new();

	rules
		.register(RoutingRule {
			id: "archive-low".to_string(),
			name: "Archive low priority system noise".to_string(),
			conditions: vec![
				RuleCondition::Context { is: Context::System },
				RuleCondition::Priority { is: Priority::Low },
			],
			target_tiers: vec![Tier::ColdArchive],
			priority: 4,
			enabled: true,
		})
		.expect("Failed to register rule.");

	let metadata = Metadata::new(Context::System, Priority::Low);
	let subject = RuleSubject { content: "heartbeat", metadata: &metadata, has_embedding: false };
	let matched = rules.first_match(&subject).expect("Expected rule to match.");

	assert_eq!(matched.target_tiers, vec![Tier::ColdArchive]);
}
