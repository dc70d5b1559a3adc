use std::{sync::Arc, time::Duration};

use strata_config::Config;
use strata_domain::{Context, Metadata, Priority, Tier};
use strata_service::{Engine, Error, StoreKind};
use strata_storage::TierBackend;
use strata_testkit::ScriptedTier;

const CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
admin_bind = "127.0.0.1:0"
log_level = "debug"

[router]
health_check_interval_ms = 1000

[[router.rules]]
id = "ops-cache"
name = "Operational notes stay hot"
target_tiers = ["fast_cache"]
priority = 5
conditions = [{ kind = "has_tag", tag = "ops" }]

[tiers]

[providers.embedding]
provider_id = "local"
dimensions = 64
"#;

fn config() -> Config {
	toml::from_str(CONFIG).expect("Config must parse.")
}

fn tiers() -> (Arc<ScriptedTier>, Arc<ScriptedTier>, Vec<Arc<dyn TierBackend>>) {
	let cache = Arc::new(ScriptedTier::new(Tier::FastCache));
	let persistent = Arc::new(ScriptedTier::new(Tier::DurablePersistent));
	let backends = vec![
		Arc::clone(&cache) as Arc<dyn TierBackend>,
		Arc::clone(&persistent) as Arc<dyn TierBackend>,
	];

	(cache, persistent, backends)
}

#[tokio::test]
async fn configured_rules_are_registered_and_applied() {
	let (cache, persistent, backends) = tiers();
	let engine = Engine::new(&config(), backends).expect("Engine must assemble.");

	assert_eq!(engine.router.rules().len(), 1);
	assert!(StoreKind::ALL.into_iter().all(|kind| engine.content_store(kind).is_some()));

	let metadata = Metadata::new(Context::Execution, Priority::Standard).with_tags(["ops"]);
	let receipt = engine
		.router
		.store("Restarted the ingest worker.".to_string(), metadata, None)
		.await
		.expect("Store must succeed.");

	assert_eq!(receipt.rule_id.as_deref(), Some("ops-cache"));
	assert_eq!(receipt.succeeded, vec![Tier::FastCache]);
	assert!(cache.contains(receipt.id));
	assert!(!persistent.contains(receipt.id));
}

#[tokio::test]
async fn invalid_configured_rules_fail_assembly() {
	let mut cfg = config();

	cfg.router.rules[0].priority = 0;

	let (_, _, backends) = tiers();

	assert!(matches!(Engine::new(&cfg, backends), Err(Error::InvalidRule(_))));
}

#[tokio::test(start_paused = true)]
async fn health_monitor_runs_between_start_and_stop() {
	let (cache, _, backends) = tiers();
	let engine = Engine::new(&config(), backends).expect("Engine must assemble.");

	assert!(!engine.is_running());

	engine.start();
	engine.start();

	assert!(engine.is_running());

	tokio::time::sleep(Duration::from_millis(2_500)).await;

	assert_eq!(cache.calls.probes(), 3);

	engine.stop().await;

	assert!(!engine.is_running());

	tokio::time::sleep(Duration::from_secs(10)).await;

	assert_eq!(cache.calls.probes(), 3);
}
