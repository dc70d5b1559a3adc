use std::{collections::HashMap, sync::Arc};

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
		Query, QueryPointsBuilder, ScrollPointsBuilder, UpsertPointsBuilder, Value,
		VectorParamsBuilder, value::Kind,
	},
};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::{BoxFuture, Error, HealthReport, Result, TierBackend, TierHit, TierQuery};
use strata_domain::{Entry, LocationToken, Tier};
use strata_providers::EmbeddingProvider;

const ENTRY_FIELD: &str = "entry";

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &strata_config::SemanticTier) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone())
					.vectors_config(VectorParamsBuilder::new(
						self.vector_dim.into(),
						Distance::Cosine,
					)),
			)
			.await?;

		tracing::info!(collection = %self.collection, "Created Qdrant collection.");

		Ok(())
	}
}

/// Similarity tier. Entries without a caller-supplied vector are embedded on write.
pub struct SemanticTier {
	store: QdrantStore,
	embedder: Arc<dyn EmbeddingProvider>,
	min_score: f32,
}
impl SemanticTier {
	pub fn new(store: QdrantStore, embedder: Arc<dyn EmbeddingProvider>, min_score: f32) -> Self {
		Self { store, embedder, min_score }
	}

	pub async fn connect(
		cfg: &strata_config::SemanticTier,
		embedder: Arc<dyn EmbeddingProvider>,
	) -> Result<Self> {
		let store = QdrantStore::new(cfg)?;

		store.ensure_collection().await?;

		Ok(Self::new(store, embedder, cfg.min_score))
	}

	async fn vector_for(&self, provided: Option<&[f32]>, text: &str) -> Result<Vec<f32>> {
		let vector = match provided {
			Some(vector) => vector.to_vec(),
			None => {
				let mut vectors = self
					.embedder
					.embed(&[text.to_string()])
					.await
					.map_err(|err| Error::Embedding { message: err.to_string() })?;

				vectors.pop().ok_or_else(|| Error::Embedding {
					message: "Embedding provider returned no vectors.".to_string(),
				})?
			},
		};

		if vector.len() != self.store.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.store.vector_dim
			)));
		}

		Ok(vector)
	}

	async fn upsert(&self, entry: &Entry) -> Result<LocationToken> {
		let vector = self.vector_for(entry.embedding.as_deref(), &entry.content).await?;
		let mut stored = entry.clone();

		stored.locations.clear();
		stored.embedding = None;

		let mut payload = Payload::new();
		let metadata = &entry.metadata;

		payload.insert("entry_id", entry.id().to_string());
		payload.insert(ENTRY_FIELD, serde_json::to_string(&stored)?);
		payload.insert("context", metadata.context.as_str().to_string());
		payload.insert("priority", metadata.priority.as_str().to_string());
		let tags = metadata.tags.iter().cloned().collect::<Vec<_>>();
		let domain = metadata.domain.clone().map(JsonValue::String).unwrap_or(JsonValue::Null);

		payload.insert("tags", JsonValue::from(tags));
		payload.insert("domain", domain);

		let point = PointStruct::new(entry.id().to_string(), vector, payload);

		self.store
			.client
			.upsert_points(
				UpsertPointsBuilder::new(self.store.collection.clone(), vec![point]).wait(true),
			)
			.await?;

		Ok(self.location(entry.id()))
	}

	async fn fetch(&self, id: Uuid) -> Result<Option<Entry>> {
		let response = self
			.store
			.client
			.scroll(
				ScrollPointsBuilder::new(self.store.collection.clone())
					.filter(id_filter(id))
					.limit(1)
					.with_payload(true),
			)
			.await?;

		response.result.first().map(|point| decode_entry(&point.payload)).transpose()
	}

	async fn similar(&self, query: &TierQuery) -> Result<Vec<TierHit>> {
		if query.max_results == 0 {
			return Ok(Vec::new());
		}

		let vector = self.vector_for(query.embedding.as_deref(), &query.text).await?;
		let mut search = QueryPointsBuilder::new(self.store.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(query.max_results as u64)
			.with_payload(true);

		if self.min_score > 0.0 {
			search = search.score_threshold(self.min_score);
		}
		if let Some(filter) = query_filter(query) {
			search = search.filter(filter);
		}

		let response = self.store.client.query(search).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in response.result {
			match decode_entry(&point.payload) {
				Ok(entry) => hits.push(TierHit { entry, relevance: point.score.clamp(0.0, 1.0) }),
				Err(err) => {
					tracing::warn!(error = %err, "Skipping Qdrant point without a readable entry.");
				},
			}
		}

		Ok(hits)
	}

	async fn remove(&self, id: Uuid) -> Result<bool> {
		if self.fetch(id).await?.is_none() {
			return Ok(false);
		}

		self.store
			.client
			.delete_points(
				DeletePointsBuilder::new(self.store.collection.clone())
					.points(id_filter(id))
					.wait(true),
			)
			.await?;

		Ok(true)
	}

	async fn probe(&self) -> Result<HealthReport> {
		let reply = self.store.client.health_check().await?;

		Ok(HealthReport::available(json!({
			"collection": self.store.collection,
			"version": reply.version,
			"vector_dim": self.store.vector_dim,
		})))
	}
}
impl TierBackend for SemanticTier {
	fn tier(&self) -> Tier {
		Tier::SemanticVector
	}

	fn location(&self, id: Uuid) -> LocationToken {
		LocationToken(format!("qdrant:{}/{id}", self.store.collection))
	}

	fn store<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<LocationToken>> {
		Box::pin(self.upsert(entry))
	}

	fn retrieve<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Entry>>> {
		Box::pin(self.fetch(id))
	}

	fn search<'a>(&'a self, query: &'a TierQuery) -> BoxFuture<'a, Result<Vec<TierHit>>> {
		Box::pin(self.similar(query))
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.remove(id))
	}

	fn health_check<'a>(&'a self) -> BoxFuture<'a, Result<HealthReport>> {
		Box::pin(self.probe())
	}
}

fn id_filter(id: Uuid) -> Filter {
	Filter::must([Condition::matches("entry_id", id.to_string())])
}

fn query_filter(query: &TierQuery) -> Option<Filter> {
	let mut must = query
		.tags
		.iter()
		.map(|tag| Condition::matches("tags", tag.clone()))
		.collect::<Vec<_>>();

	if !query.contexts.is_empty() {
		let contexts =
			query.contexts.iter().map(|context| context.as_str().to_string()).collect::<Vec<_>>();

		must.push(Condition::matches("context", contexts));
	}
	if let Some(domain) = query.domain.as_ref() {
		must.push(Condition::matches("domain", domain.clone()));
	}

	(!must.is_empty()).then(|| Filter::must(must))
}

fn decode_entry(payload: &HashMap<String, Value>) -> Result<Entry> {
	match payload.get(ENTRY_FIELD).and_then(|value| value.kind.as_ref()) {
		Some(Kind::StringValue(raw)) => Ok(serde_json::from_str(raw)?),
		_ => Err(Error::InvalidArgument("Qdrant point payload has no entry.".to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use strata_domain::{Context, Metadata, Priority};

	#[test]
	fn payload_entry_decodes() {
		let entry = Entry::new("vector note", Metadata::new(Context::Pattern, Priority::High));
		let mut payload = HashMap::new();

		payload.insert(
			ENTRY_FIELD.to_string(),
			Value::from(serde_json::to_string(&entry).expect("Entry must serialize.")),
		);

		let decoded = decode_entry(&payload).expect("Payload must decode.");

		assert_eq!(decoded.id(), entry.id());
		assert!(decode_entry(&HashMap::new()).is_err());
	}

	#[test]
	fn empty_query_needs_no_filter() {
		let mut query = TierQuery::new("anything", 3);

		assert!(query_filter(&query).is_none());

		query.contexts = vec![Context::Knowledge, Context::Pattern];
		query.tags = vec!["ops".to_string()];

		let filter = query_filter(&query).expect("Filter must be built.");

		assert_eq!(filter.must.len(), 2);
	}
}
