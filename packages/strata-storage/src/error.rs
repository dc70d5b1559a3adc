use strata_domain::Tier;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Tier {tier} is unavailable: {message}")]
	Unavailable { tier: Tier, message: String },
	#[error("Tier {tier} timed out after {millis} ms.")]
	Timeout { tier: Tier, millis: u64 },
	#[error("Embedding failed: {message}")]
	Embedding { message: String },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
