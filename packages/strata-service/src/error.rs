pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Synchronous failures. Tier failures never surface here; they are reported as data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Invalid routing rule: {0}")]
	InvalidRule(#[from] strata_domain::Error),
	#[error("Routing rule {id:?} was not found.")]
	RuleNotFound { id: String },
	#[error("Tier {tier} is not configured.")]
	TierNotConfigured { tier: strata_domain::Tier },
}
