use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
};

use serde_json::json;
use uuid::Uuid;

use crate::{
	BoxFuture, HealthReport, Result, TierBackend, TierHit, TierQuery, backend::rank_lexically,
};
use strata_domain::{Entry, LocationToken, Tier};

/// Cold tier that keeps one JSON document per entry under a root directory.
pub struct ArchiveTier {
	root: PathBuf,
}
impl ArchiveTier {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn path_for(&self, id: Uuid) -> PathBuf {
		self.root.join(format!("{id}.json"))
	}

	async fn write(&self, entry: &Entry) -> Result<LocationToken> {
		let mut stored = entry.clone();

		stored.locations.clear();

		let body = serde_json::to_vec_pretty(&stored)?;
		let path = self.path_for(entry.id());
		let staging = self.root.join(format!(".{}.json.tmp", entry.id()));

		tokio::fs::create_dir_all(&self.root).await?;
		tokio::fs::write(&staging, body).await?;
		tokio::fs::rename(&staging, &path).await?;

		Ok(self.location(entry.id()))
	}

	async fn read(&self, id: Uuid) -> Result<Option<Entry>> {
		match tokio::fs::read(self.path_for(id)).await {
			Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	async fn scan(&self, query: &TierQuery) -> Result<Vec<TierHit>> {
		let mut dir = match tokio::fs::read_dir(&self.root).await {
			Ok(dir) => dir,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(err.into()),
		};
		let mut entries = Vec::new();

		while let Some(item) = dir.next_entry().await? {
			let path = item.path();

			if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
				continue;
			}

			let raw = tokio::fs::read(&path).await?;

			match serde_json::from_slice::<Entry>(&raw) {
				Ok(entry) => entries.push(entry),
				Err(err) => {
					tracing::warn!(
						path = %path.display(),
						error = %err,
						"Skipping unreadable archive document."
					);
				},
			}
		}

		Ok(rank_lexically(query, entries))
	}

	async fn remove(&self, id: Uuid) -> Result<bool> {
		match tokio::fs::remove_file(self.path_for(id)).await {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}

	async fn probe(&self) -> Result<HealthReport> {
		tokio::fs::create_dir_all(&self.root).await?;

		let metadata = tokio::fs::metadata(&self.root).await?;

		Ok(HealthReport {
			available: metadata.is_dir() && !metadata.permissions().readonly(),
			diagnostics: json!({ "root": self.root.display().to_string() }),
		})
	}
}
impl TierBackend for ArchiveTier {
	fn tier(&self) -> Tier {
		Tier::ColdArchive
	}

	fn location(&self, id: Uuid) -> LocationToken {
		LocationToken(format!("archive:{}", self.path_for(id).display()))
	}

	fn store<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<LocationToken>> {
		Box::pin(self.write(entry))
	}

	fn retrieve<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Entry>>> {
		Box::pin(self.read(id))
	}

	fn search<'a>(&'a self, query: &'a TierQuery) -> BoxFuture<'a, Result<Vec<TierHit>>> {
		Box::pin(self.scan(query))
	}

	fn delete<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.remove(id))
	}

	fn health_check<'a>(&'a self) -> BoxFuture<'a, Result<HealthReport>> {
		Box::pin(self.probe())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use strata_domain::{Context, Metadata, Priority};

	fn scratch_dir() -> PathBuf {
		std::env::temp_dir().join(format!("strata-archive-{}", Uuid::new_v4()))
	}

	#[tokio::test]
	async fn stored_entries_survive_a_new_handle() {
		let root = scratch_dir();
		let entry = Entry::new(
			"quarterly revenue review notes",
			Metadata::new(Context::Knowledge, Priority::Low).with_domain("business"),
		);

		ArchiveTier::new(&root).store(&entry).await.expect("Store must succeed.");

		let reopened = ArchiveTier::new(&root);
		let loaded =
			reopened.retrieve(entry.id()).await.expect("Retrieve must succeed.").expect("Entry.");

		assert_eq!(loaded.id(), entry.id());
		assert_eq!(loaded.metadata.domain.as_deref(), Some("business"));

		let hits = reopened
			.search(&TierQuery::new("revenue review", 5))
			.await
			.expect("Search must succeed.");

		assert_eq!(hits.len(), 1);
		assert!(reopened.delete(entry.id()).await.expect("Delete must succeed."));
		assert!(!reopened.delete(entry.id()).await.expect("Delete must succeed."));

		let _ = tokio::fs::remove_dir_all(&root).await;
	}

	#[tokio::test]
	async fn missing_root_reads_as_empty() {
		let tier = ArchiveTier::new(scratch_dir());

		assert!(tier.retrieve(Uuid::new_v4()).await.expect("Retrieve must succeed.").is_none());
		assert!(tier.search(&TierQuery::new("anything", 5)).await.expect("Search.").is_empty());
	}
}
