use std::{env, fs, path::PathBuf};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Map, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use strata_api::{routes, state::AppState};
use strata_config::{
	ArchiveTier, CacheTier, Config, EmbeddingProviderConfig, Providers, Rag, Router as RouterConfig,
	Service, Tiers, TtlSeconds,
};

fn test_config(archive_root: PathBuf) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		router: RouterConfig::default(),
		tiers: Tiers {
			cache: CacheTier { enabled: true, capacity: 128 },
			semantic: None,
			persistent: None,
			archive: Some(ArchiveTier { root: archive_root }),
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "local".to_string(),
				api_base: String::new(),
				api_key: String::new(),
				path: String::new(),
				model: String::new(),
				dimensions: 64,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		rag: Rag::default(),
		ttl: TtlSeconds::default(),
	}
}

struct TestApp {
	api: Router,
	admin: Router,
	archive_root: PathBuf,
}
impl TestApp {
	async fn new() -> Self {
		let archive_root = env::temp_dir().join(format!("strata-http-{}", Uuid::new_v4()));
		let state = AppState::new(test_config(archive_root.clone()))
			.await
			.expect("Failed to initialize app state.");

		Self {
			api: routes::router(state.clone()),
			admin: routes::admin_router(state),
			archive_root,
		}
	}

	async fn api(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		call(self.api.clone(), method, uri, body).await
	}

	async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		call(self.admin.clone(), method, uri, body).await
	}
}
impl Drop for TestApp {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.archive_root);
	}
}

async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
	let builder = Request::builder().method(method).uri(uri);
	let request = match body {
		Some(json) => builder
			.header("content-type", "application/json")
			.body(Body::from(json.to_string()))
			.expect("Failed to build request."),
		None => builder.body(Body::empty()).expect("Failed to build request."),
	};
	let response = app.oneshot(request).await.expect("Failed to call the router.");
	let status = response.status();
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Failed to parse response.")
	};

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let app = TestApp::new().await;
	let (status, _) = app.api("GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn stored_memory_can_be_retrieved_and_deleted() {
	let app = TestApp::new().await;
	let (status, receipt) = app
		.api(
			"POST",
			"/v1/memory",
			Some(serde_json::json!({
				"content": "Rotate the signing key.",
				"context": "knowledge",
				"priority": "high",
				"tags": ["ops"]
			})),
		)
		.await;

	assert_eq!(status, StatusCode::CREATED);
	assert!(
		receipt["succeeded"]
			.as_array()
			.expect("succeeded must be an array.")
			.contains(&Value::from("fast_cache"))
	);

	let id = receipt["id"].as_str().expect("Receipt must carry an id.").to_string();
	let (status, entry) = app.api("GET", &format!("/v1/memory/{id}?priority=high"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(entry["content"], "Rotate the signing key.");

	let (status, report) = app.api("DELETE", &format!("/v1/memory/{id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(report["deleted"], true);

	let (status, error) = app.api("GET", &format!("/v1/memory/{id}"), None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(error["error_code"], "not_found");
}

#[tokio::test]
async fn updates_unknown_entries_are_not_found() {
	let app = TestApp::new().await;
	let (status, error) = app
		.api(
			"PATCH",
			&format!("/v1/memory/{}", Uuid::new_v4()),
			Some(serde_json::json!({ "content": "New text." })),
		)
		.await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(error["error_code"], "not_found");
}

#[tokio::test]
async fn empty_search_queries_are_rejected() {
	let app = TestApp::new().await;
	let (status, error) = app
		.api("POST", "/v1/memory/search", Some(serde_json::json!({ "query": "  " })))
		.await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(error["error_code"], "invalid_request");
}

#[tokio::test]
async fn rag_query_reads_items_put_into_stores() {
	let app = TestApp::new().await;
	let (status, _) = app
		.api(
			"POST",
			"/v1/stores/patterns",
			Some(serde_json::json!({
				"title": "Connection pooling guide",
				"body": "Optimize database connection pooling by sizing pools from measured load.",
				"item_type": "guideline"
			})),
		)
		.await;

	assert_eq!(status, StatusCode::CREATED);

	let (status, response) = app
		.api(
			"POST",
			"/v1/rag/query",
			Some(serde_json::json!({
				"query": "optimize database connection pooling",
				"domain": "technical"
			})),
		)
		.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(response["strategy"], "specialized");
	assert_eq!(response["sources"].as_array().map(Vec::len), Some(1));
	assert!(
		response["synthesis"]
			.as_str()
			.is_some_and(|text| text.contains("Connection pooling guide"))
	);

	let (status, metrics) = app.admin("GET", "/v1/admin/rag", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(metrics["overall"]["queries"], 1);
}

#[tokio::test]
async fn admin_rules_steer_placement_until_removed() {
	let app = TestApp::new().await;
	let rule = serde_json::json!({
		"id": "audit-archive",
		"name": "Archive audit records",
		"conditions": [{ "kind": "has_tag", "tag": "audit" }],
		"target_tiers": ["cold_archive"],
		"priority": 7
	});
	let (status, rules) = app.admin("POST", "/v1/admin/rules", Some(rule)).await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(rules["rules"][0]["id"], "audit-archive");

	let (status, receipt) = app
		.api(
			"POST",
			"/v1/memory",
			Some(serde_json::json!({
				"content": "Quarterly access review completed.",
				"context": "system",
				"priority": "standard",
				"tags": ["audit"]
			})),
		)
		.await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(receipt["rule_id"], "audit-archive");
	assert_eq!(receipt["succeeded"], serde_json::json!(["cold_archive"]));

	let (status, _) = app.admin("DELETE", "/v1/admin/rules/audit-archive", None).await;

	assert_eq!(status, StatusCode::NO_CONTENT);

	let (status, error) = app.admin("DELETE", "/v1/admin/rules/audit-archive", None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(error["error_code"], "rule_not_found");
}

#[tokio::test]
async fn malformed_rules_are_rejected() {
	let app = TestApp::new().await;
	let rule = serde_json::json!({
		"id": "broken",
		"name": "Broken",
		"target_tiers": ["fast_cache"],
		"priority": 0
	});
	let (status, error) = app.admin("POST", "/v1/admin/rules", Some(rule)).await;

	assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(error["error_code"], "invalid_rule");

	let (_, rules) = app.admin("GET", "/v1/admin/rules", None).await;

	assert_eq!(rules["rules"], serde_json::json!([]));
}

#[tokio::test]
async fn admin_reports_tiers_and_metrics() {
	let app = TestApp::new().await;
	let (status, tiers) = app.admin("GET", "/v1/admin/tiers", None).await;

	assert_eq!(status, StatusCode::OK);

	let names = tiers
		.as_array()
		.expect("Tiers must be an array.")
		.iter()
		.map(|snapshot| snapshot["tier"].clone())
		.collect::<Vec<_>>();

	assert_eq!(names, vec![Value::from("fast_cache"), Value::from("cold_archive")]);

	let (status, metrics) = app.admin("GET", "/v1/admin/metrics", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(metrics["router"]["requests"], 0);
}
