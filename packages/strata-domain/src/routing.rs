use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Context, Error, Metadata, Priority, Result, Tier, selection};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
	PerformanceFirst,
	ReliabilityFirst,
	CostOptimized,
	Balanced,
	#[default]
	Intelligent,
}
impl RoutingStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::PerformanceFirst => "performance_first",
			Self::ReliabilityFirst => "reliability_first",
			Self::CostOptimized => "cost_optimized",
			Self::Balanced => "balanced",
			Self::Intelligent => "intelligent",
		}
	}

	/// Ordered candidate tiers for one store. `Intelligent` defers to
	/// [`selection::default_tiers`].
	pub fn candidate_tiers(self, content: &str, metadata: &Metadata) -> Vec<Tier> {
		use Priority::*;
		use Tier::*;

		match (self, metadata.priority) {
			(Self::Intelligent, _) => selection::default_tiers(content, metadata),
			(Self::PerformanceFirst, Critical) =>
				vec![FastCache, SemanticVector, DurablePersistent],
			(Self::PerformanceFirst, High) => vec![FastCache, SemanticVector],
			(Self::PerformanceFirst, Standard | Low) => vec![FastCache],
			(Self::ReliabilityFirst, Critical) =>
				vec![DurablePersistent, SemanticVector, FastCache],
			(Self::ReliabilityFirst, High) => vec![DurablePersistent, SemanticVector],
			(Self::ReliabilityFirst, Standard | Low) => vec![DurablePersistent],
			(Self::CostOptimized, Critical) => vec![FastCache, DurablePersistent],
			(Self::CostOptimized, High | Standard) => vec![DurablePersistent],
			(Self::CostOptimized, Low) => vec![ColdArchive],
			(Self::Balanced, Critical) => vec![FastCache, SemanticVector, DurablePersistent],
			(Self::Balanced, High) => vec![FastCache, DurablePersistent],
			(Self::Balanced, Standard) => vec![SemanticVector, DurablePersistent],
			(Self::Balanced, Low) => vec![DurablePersistent],
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
	#[default]
	ResponseTime,
	Capacity,
	Connections,
}

/// One predicate of a routing rule. All conditions of a rule must hold for it to match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
	Priority { is: Priority },
	PriorityAtLeast { min: Priority },
	Context { is: Context },
	HasTag { tag: String },
	Domain { is: String },
	ContentLongerThan { chars: usize },
	ContentMatches { pattern: String },
	Owner { is: String },
	HasEmbedding,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub conditions: Vec<RuleCondition>,
	pub target_tiers: Vec<Tier>,
	pub priority: u8,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
}

/// What a rule is evaluated against.
pub struct RuleSubject<'a> {
	pub content: &'a str,
	pub metadata: &'a Metadata,
	pub has_embedding: bool,
}

/// Registered rules kept in evaluation order: descending priority, then registration order.
#[derive(Debug, Default)]
pub struct RuleSet {
	rules: Vec<CompiledRule>,
	next_seq: u64,
}
impl RuleSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, rule: RoutingRule) -> Result<()> {
		validate_rule(&rule)?;

		if self.rules.iter().any(|existing| existing.rule.id == rule.id) {
			return Err(Error::DuplicateRule { id: rule.id });
		}

		let patterns = compile_patterns(&rule)?;
		let seq = self.next_seq;

		self.next_seq += 1;
		self.rules.push(CompiledRule { rule, patterns, seq });
		self.rules.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority).then(a.seq.cmp(&b.seq)));

		Ok(())
	}

	pub fn remove(&mut self, id: &str) -> bool {
		let before = self.rules.len();

		self.rules.retain(|compiled| compiled.rule.id != id);

		self.rules.len() != before
	}

	pub fn rules(&self) -> Vec<RoutingRule> {
		self.rules.iter().map(|compiled| compiled.rule.clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// First enabled matching rule in evaluation order.
	pub fn first_match(&self, subject: &RuleSubject<'_>) -> Option<&RoutingRule> {
		self.rules
			.iter()
			.filter(|compiled| compiled.rule.enabled)
			.find(|compiled| compiled.matches(subject))
			.map(|compiled| &compiled.rule)
	}
}

#[derive(Debug)]
struct CompiledRule {
	rule: RoutingRule,
	// One entry per `ContentMatches` condition, in condition order.
	patterns: Vec<Regex>,
	seq: u64,
}
impl CompiledRule {
	fn matches(&self, subject: &RuleSubject<'_>) -> bool {
		let mut patterns = self.patterns.iter();

		self.rule.conditions.iter().all(|condition| match condition {
			RuleCondition::Priority { is } => subject.metadata.priority == *is,
			RuleCondition::PriorityAtLeast { min } =>
				subject.metadata.priority.rank() >= min.rank(),
			RuleCondition::Context { is } => subject.metadata.context == *is,
			RuleCondition::HasTag { tag } => subject.metadata.tags.contains(tag),
			RuleCondition::Domain { is } =>
				subject.metadata.domain.as_deref().map(|domain| domain == is).unwrap_or(false),
			RuleCondition::ContentLongerThan { chars } =>
				subject.content.chars().count() > *chars,
			RuleCondition::ContentMatches { .. } =>
				patterns.next().map(|re| re.is_match(subject.content)).unwrap_or(false),
			RuleCondition::Owner { is } =>
				subject.metadata.owner_id.as_deref().map(|owner| owner == is).unwrap_or(false),
			RuleCondition::HasEmbedding => subject.has_embedding,
		})
	}
}

pub fn validate_rule(rule: &RoutingRule) -> Result<()> {
	if rule.id.trim().is_empty() {
		return Err(Error::MissingRuleId);
	}
	if rule.name.trim().is_empty() {
		return Err(Error::MissingRuleName { id: rule.id.clone() });
	}
	if rule.target_tiers.is_empty() {
		return Err(Error::MissingTargets { id: rule.id.clone() });
	}
	if !(1..=10).contains(&rule.priority) {
		return Err(Error::PriorityOutOfRange { id: rule.id.clone(), priority: rule.priority });
	}

	compile_patterns(rule).map(|_| ())
}

fn compile_patterns(rule: &RoutingRule) -> Result<Vec<Regex>> {
	let mut patterns = Vec::new();

	for condition in &rule.conditions {
		if let RuleCondition::ContentMatches { pattern } = condition {
			let re = Regex::new(pattern).map_err(|err| Error::InvalidPattern {
				id: rule.id.clone(),
				message: err.to_string(),
			})?;

			patterns.push(re);
		}
	}

	Ok(patterns)
}

fn default_enabled() -> bool {
	true
}
