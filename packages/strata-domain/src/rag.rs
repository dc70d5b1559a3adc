use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagDomain {
	Technical,
	Business,
	#[default]
	General,
}
impl RagDomain {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Technical => "technical",
			Self::Business => "business",
			Self::General => "general",
		}
	}

	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"technical" => Self::Technical,
			"business" => Self::Business,
			_ => Self::General,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
	Keyword,
	Semantic,
	Specialized,
	#[default]
	Hybrid,
}
impl RetrievalStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Keyword => "keyword",
			Self::Semantic => "semantic",
			Self::Specialized => "specialized",
			Self::Hybrid => "hybrid",
		}
	}

	pub fn uses_content_stores(self) -> bool {
		!matches!(self, Self::Semantic)
	}

	pub fn uses_vector_query(self) -> bool {
		!matches!(self, Self::Keyword)
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
	Concatenation,
	#[default]
	Structured,
	Summarization,
	Narrative,
	Analytical,
}
impl SynthesisMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Concatenation => "concatenation",
			Self::Structured => "structured",
			Self::Summarization => "summarization",
			Self::Narrative => "narrative",
			Self::Analytical => "analytical",
		}
	}
}
