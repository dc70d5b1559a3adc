pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Routing rule id must be non-empty.")]
	MissingRuleId,
	#[error("Routing rule {id:?} must have a non-empty name.")]
	MissingRuleName { id: String },
	#[error("Routing rule {id:?} must target at least one tier.")]
	MissingTargets { id: String },
	#[error("Routing rule {id:?} priority {priority} must be in the range 1-10.")]
	PriorityOutOfRange { id: String, priority: u8 },
	#[error("Routing rule {id:?} is already registered.")]
	DuplicateRule { id: String },
	#[error("Routing rule {id:?} has an invalid content pattern: {message}")]
	InvalidPattern { id: String, message: String },
}
