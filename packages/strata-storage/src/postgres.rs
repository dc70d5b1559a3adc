use serde_json::json;
use uuid::Uuid;

use crate::{
	BoxFuture, HealthReport, Result, TierBackend, TierHit, TierQuery,
	backend::lexical_relevance,
	db::Db,
	models::{MemoryEntryRow, RankedEntryRow},
};
use strata_domain::{Entry, LocationToken, Tier, text};

/// Durable tier backed by a single Postgres table with full-text lookup.
pub struct PostgresTier {
	db: Db,
}
impl PostgresTier {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub async fn connect(cfg: &strata_config::PersistentTier) -> Result<Self> {
		let db = Db::connect(cfg).await?;

		db.ensure_schema().await?;

		Ok(Self { db })
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	async fn upsert(&self, entry: &Entry) -> Result<LocationToken> {
		let mut stored = entry.clone();

		stored.locations.clear();

		let body = serde_json::to_value(&stored)?;
		let metadata = &entry.metadata;
		let tags = metadata.tags.iter().cloned().collect::<Vec<_>>();

		sqlx::query(
			"\
INSERT INTO memory_entries (
	entry_id,
	content,
	context,
	priority,
	tags,
	domain,
	confidence,
	owner_id,
	body,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (entry_id) DO UPDATE
SET
	content = EXCLUDED.content,
	context = EXCLUDED.context,
	priority = EXCLUDED.priority,
	tags = EXCLUDED.tags,
	domain = EXCLUDED.domain,
	confidence = EXCLUDED.confidence,
	owner_id = EXCLUDED.owner_id,
	body = EXCLUDED.body,
	updated_at = EXCLUDED.updated_at,
	stored_at = now()",
		)
		.bind(entry.id())
		.bind(entry.content.as_str())
		.bind(metadata.context.as_str())
		.bind(metadata.priority.as_str())
		.bind(tags)
		.bind(metadata.domain.as_deref())
		.bind(metadata.confidence)
		.bind(metadata.owner_id.as_deref())
		.bind(body)
		.bind(metadata.created_at)
		.bind(metadata.updated_at())
		.execute(&self.db.pool)
		.await?;

		Ok(self.location(entry.id()))
	}

	async fn fetch(&self, id: Uuid) -> Result<Option<Entry>> {
		let row: Option<MemoryEntryRow> = sqlx::query_as(
			"\
SELECT entry_id, body, created_at, updated_at
FROM memory_entries
WHERE entry_id = $1",
		)
		.bind(id)
		.fetch_optional(&self.db.pool)
		.await?;

		row.map(MemoryEntryRow::into_entry).transpose()
	}

	async fn full_text(&self, query: &TierQuery) -> Result<Vec<TierHit>> {
		let tokens = text::tokenize(&query.text);

		if tokens.is_empty() || query.max_results == 0 {
			return Ok(Vec::new());
		}

		let contexts =
			query.contexts.iter().map(|context| context.as_str().to_string()).collect::<Vec<_>>();
		let limit = i64::try_from(query.max_results).unwrap_or(i64::MAX);
		let rows: Vec<RankedEntryRow> = sqlx::query_as(
			"\
SELECT
	body,
	ts_rank(to_tsvector('english', content), websearch_to_tsquery('english', $1), 32)::real AS rank
FROM memory_entries
WHERE to_tsvector('english', content) @@ websearch_to_tsquery('english', $1)
	AND (cardinality($2::text[]) = 0 OR context = ANY($2::text[]))
	AND tags @> $3::text[]
	AND ($4::text IS NULL OR domain = $4)
ORDER BY rank DESC, entry_id
LIMIT $5",
		)
		.bind(tokens.join(" or "))
		.bind(contexts)
		.bind(query.tags.clone())
		.bind(query.domain.as_deref())
		.bind(limit)
		.fetch_all(&self.db.pool)
		.await?;
		let mut hits = Vec::with_capacity(rows.len());

		for row in rows {
			let entry: Entry = serde_json::from_value(row.body)?;
			let relevance = lexical_relevance(&tokens, &entry.content).max(row.rank).min(1.0);

			hits.push(TierHit { entry, relevance });
		}

		hits.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

		Ok(hits)
	}

	async fn remove(&self, id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM memory_entries WHERE entry_id = $1")
			.bind(id)
			.execute(&self.db.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn probe(&self) -> Result<HealthReport> {
		let entries: i64 = sqlx::query_scalar("SELECT count(*) FROM memory_entries")
			.fetch_one(&self.db.pool)
			.await?;

		Ok(HealthReport::available(json!({
			"entries": entries,
			"pool_size": self.db.pool.size(),
			"idle_connections": self.db.pool.num_idle(),
		})))
	}
}
impl TierBackend for PostgresTier {
	fn tier(&self) -> Tier {
		Tier::DurablePersistent
	}

	fn location(&self, id: Uuid) -> LocationToken {
		LocationToken(format!("postgres:memory_entries/{id}"))
	}

	fn store<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<LocationToken>> {
		Box::pin(self.upsert(entry))
	}

	fn retrieve<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Entry>>> {
		Box::pin(self.fetch(id))
	}

	fn search<'a>(&'a self, query: &'a TierQuery) -> BoxFuture<'a, Result<Vec<TierHit>>> {
		Box::pin(self.full_text(query))
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.remove(id))
	}

	fn health_check<'a>(&'a self) -> BoxFuture<'a, Result<HealthReport>> {
		Box::pin(self.probe())
	}
}
