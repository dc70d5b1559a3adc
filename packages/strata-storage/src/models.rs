use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Result;
use strata_domain::Entry;

#[derive(Debug, sqlx::FromRow)]
pub struct MemoryEntryRow {
	pub entry_id: Uuid,
	pub body: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl MemoryEntryRow {
	pub fn into_entry(self) -> Result<Entry> {
		Ok(serde_json::from_value(self.body)?)
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct RankedEntryRow {
	pub body: Value,
	pub rank: f32,
}
