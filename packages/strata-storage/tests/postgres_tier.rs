use strata_domain::{Context, Entry, Metadata, Priority};
use strata_storage::{TierBackend, TierQuery};
use strata_testkit::TierSandbox;

#[tokio::test]
#[ignore = "Requires external Postgres. Set STRATA_PG_DSN to run."]
async fn entries_round_trip_through_postgres() {
	let Some(base_dsn) = strata_testkit::env_dsn() else {
		eprintln!("Skipping entries_round_trip_through_postgres; set STRATA_PG_DSN to run this test.");

		return;
	};
	let mut sandbox = TierSandbox::new();
	let tier = sandbox.postgres_tier(&base_dsn, 2).await.expect("Failed to open the Postgres tier.");
	let entry = Entry::new(
		"Tune database connection pooling before raising worker counts.",
		Metadata::new(Context::Knowledge, Priority::High).with_tags(["ops"]).with_domain("technical"),
	);
	let token = tier.store(&entry).await.expect("Store must succeed.");

	assert_eq!(token, tier.location(entry.id()));

	let loaded = tier
		.retrieve(entry.id())
		.await
		.expect("Retrieve must succeed.")
		.expect("Entry must be present.");

	assert_eq!(loaded.content, entry.content);
	assert_eq!(loaded.metadata.tags, entry.metadata.tags);

	let mut query = TierQuery::new("connection pooling", 5);

	query.tags = vec!["ops".to_string()];

	let hits = tier.search(&query).await.expect("Search must succeed.");

	assert_eq!(hits.len(), 1);
	assert!(hits[0].relevance > 0.0);

	query.tags = vec!["billing".to_string()];

	assert!(tier.search(&query).await.expect("Search must succeed.").is_empty());
	assert!(tier.delete(entry.id()).await.expect("Delete must succeed."));
	assert!(!tier.delete(entry.id()).await.expect("Delete must succeed."));

	let report = tier.health_check().await.expect("Health check must succeed.");

	assert!(report.available);

	drop(tier);
	sandbox.teardown().await.expect("Failed to tear down the sandbox.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set STRATA_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = strata_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set STRATA_PG_DSN to run this test.");

		return;
	};
	let mut sandbox = TierSandbox::new();
	let tier = sandbox.postgres_tier(&base_dsn, 1).await.expect("Failed to open the Postgres tier.");

	tier.db().ensure_schema().await.expect("Second bootstrap must succeed.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name = 'memory_entries'",
	)
	.fetch_one(&tier.db().pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);

	drop(tier);
	sandbox.teardown().await.expect("Failed to tear down the sandbox.");
}
