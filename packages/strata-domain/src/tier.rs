use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Storage tiers ordered from fastest and most expensive to slowest and cheapest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
	FastCache,
	SemanticVector,
	DurablePersistent,
	ColdArchive,
}
impl Tier {
	pub const ALL: [Tier; 4] =
		[Tier::FastCache, Tier::SemanticVector, Tier::DurablePersistent, Tier::ColdArchive];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::FastCache => "fast_cache",
			Self::SemanticVector => "semantic_vector",
			Self::DurablePersistent => "durable_persistent",
			Self::ColdArchive => "cold_archive",
		}
	}
}

impl fmt::Display for Tier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Tier {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim() {
			"fast_cache" | "cache" => Ok(Self::FastCache),
			"semantic_vector" | "semantic" => Ok(Self::SemanticVector),
			"durable_persistent" | "persistent" => Ok(Self::DurablePersistent),
			"cold_archive" | "archive" => Ok(Self::ColdArchive),
			other => Err(format!("Unknown tier {other:?}.")),
		}
	}
}
