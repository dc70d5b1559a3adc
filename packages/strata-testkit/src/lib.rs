mod error;
mod scripted;

pub use error::{Error, Result};
pub use scripted::{Calls, ScriptedTier};

use std::{env, str::FromStr, sync::Arc};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

use strata_config::{PersistentTier as PersistentConfig, SemanticTier as SemanticConfig};
use strata_providers::local::HashingEmbedding;
use strata_storage::{postgres::PostgresTier, qdrant::SemanticTier};

pub fn env_dsn() -> Option<String> {
	env::var("STRATA_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("STRATA_QDRANT_URL").ok()
}

/// Scratch backing services for live tier tests.
///
/// Each tier handed out gets its own Postgres database or Qdrant collection, named after the
/// sandbox. [`TierSandbox::teardown`] drops all of them.
pub struct TierSandbox {
	label: String,
	databases: Vec<(PgConnectOptions, String)>,
	collections: Vec<(String, String)>,
}
impl TierSandbox {
	pub fn new() -> Self {
		Self {
			label: format!("strata_test_{}", Uuid::new_v4().simple()),
			databases: Vec::new(),
			collections: Vec::new(),
		}
	}

	/// A durable tier on a fresh database created through `base_dsn`. The schema is
	/// bootstrapped by the tier itself.
	pub async fn postgres_tier(
		&mut self,
		base_dsn: &str,
		pool_max_conns: u32,
	) -> Result<PostgresTier> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse STRATA_PG_DSN: {err}.")))?;
		let admin = base.clone().database("postgres");
		let name = format!("{}_{}", self.label, self.databases.len());
		let mut conn = PgConnection::connect_with(&admin).await?;

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;
		conn.close().await?;

		let cfg = PersistentConfig {
			dsn: base.database(&name).to_url_lossy().to_string(),
			pool_max_conns,
		};

		self.databases.push((admin, name));

		PostgresTier::connect(&cfg)
			.await
			.map_err(|err| Error::Message(format!("Failed to open the Postgres tier: {err}.")))
	}

	/// A semantic tier on a fresh collection, embedding with the local hashing provider.
	pub async fn semantic_tier(
		&mut self,
		qdrant_url: &str,
		dimensions: u32,
	) -> Result<SemanticTier> {
		let collection = format!("{}_{}", self.label, self.collections.len());
		let cfg = SemanticConfig {
			url: qdrant_url.to_string(),
			collection: collection.clone(),
			vector_dim: dimensions,
			min_score: 0.0,
		};

		self.collections.push((qdrant_url.to_string(), collection));

		SemanticTier::connect(&cfg, Arc::new(HashingEmbedding::new(dimensions as usize)))
			.await
			.map_err(|err| Error::Message(format!("Failed to open the semantic tier: {err}.")))
	}

	/// Drops every database and collection, reporting the first failure after trying all.
	pub async fn teardown(self) -> Result<()> {
		let mut first_err = None;

		for (admin, name) in &self.databases {
			if let Err(err) = drop_database(admin, name).await {
				eprintln!("Test database {name} was not dropped: {err}.");

				first_err.get_or_insert(err);
			}
		}
		for (url, collection) in &self.collections {
			if let Err(err) = drop_collection(url, collection).await {
				eprintln!("Test collection {collection} was not dropped: {err}.");

				first_err.get_or_insert(err);
			}
		}

		match first_err {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}
impl Default for TierSandbox {
	fn default() -> Self {
		Self::new()
	}
}

async fn drop_database(admin: &PgConnectOptions, name: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin).await?;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str()).await?;
	conn.close().await?;

	Ok(())
}

async fn drop_collection(url: &str, collection: &str) -> Result<()> {
	let client = Qdrant::from_url(url).build()?;

	client.delete_collection(collection.to_string()).await?;

	Ok(())
}
