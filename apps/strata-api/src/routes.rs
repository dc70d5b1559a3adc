use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use strata_domain::{Context, Entry, Metadata, MetadataPatch, Priority, routing::RoutingRule};
use strata_service::{
	DeleteReport, Error as ServiceError, FacadeMetrics, RagMetrics, RagQuery, RagResponse,
	RouterMetrics, SearchRequest, SearchResult, StoreItem, StoreKind, StoreReceipt, TierSnapshot,
	UpdateReport,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/memory", post(store_memory))
		.route("/v1/memory/search", post(search_memory))
		.route(
			"/v1/memory/{id}",
			get(retrieve_memory).patch(update_memory).delete(delete_memory),
		)
		.route("/v1/stores/{kind}", post(put_item))
		.route("/v1/rag/query", post(rag_query))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/metrics", get(metrics))
		.route("/v1/admin/tiers", get(tiers))
		.route("/v1/admin/rag", get(rag_metrics))
		.route("/v1/admin/rules", get(list_rules).post(register_rule))
		.route("/v1/admin/rules/{id}", delete(remove_rule))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StoreMemoryRequest {
	pub content: String,
	pub context: Context,
	pub priority: Priority,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub ttl_seconds: Option<u64>,
	#[serde(default)]
	pub domain: Option<String>,
	#[serde(default)]
	pub confidence: Option<f32>,
	#[serde(default)]
	pub owner_id: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}
impl StoreMemoryRequest {
	fn metadata(&self) -> Metadata {
		let mut metadata = Metadata::new(self.context, self.priority).with_tags(self.tags.clone());

		if let Some(ttl_seconds) = self.ttl_seconds {
			metadata = metadata.with_ttl_seconds(ttl_seconds);
		}
		if let Some(domain) = self.domain.as_deref() {
			metadata = metadata.with_domain(domain);
		}
		if let Some(confidence) = self.confidence {
			metadata = metadata.with_confidence(confidence);
		}
		if let Some(owner_id) = self.owner_id.as_deref() {
			metadata = metadata.with_owner(owner_id);
		}
		if let Some(session_id) = self.session_id.as_deref() {
			metadata = metadata.with_session(session_id);
		}

		metadata
	}
}

#[derive(Debug, Deserialize)]
pub struct RetrieveParams {
	#[serde(default)]
	pub priority: Option<Priority>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemoryRequest {
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub metadata: Option<MetadataPatch>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
	pub router: RouterMetrics,
	pub facade: FacadeMetrics,
}

#[derive(Debug, Serialize)]
pub struct RulesResponse {
	pub rules: Vec<RoutingRule>,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn store_memory(
	State(state): State<AppState>,
	Json(payload): Json<StoreMemoryRequest>,
) -> Result<(StatusCode, Json<StoreReceipt>), ApiError> {
	let metadata = payload.metadata();
	let receipt = state.engine.router.store(payload.content, metadata, payload.embedding).await?;
	let status =
		if receipt.is_stored() { StatusCode::CREATED } else { StatusCode::SERVICE_UNAVAILABLE };

	Ok((status, Json(receipt)))
}

async fn retrieve_memory(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Query(params): Query<RetrieveParams>,
) -> Result<Json<Entry>, ApiError> {
	let priority = params.priority.unwrap_or(Priority::Standard);

	match state.engine.router.retrieve(id, priority).await {
		Some(entry) => Ok(Json(entry)),
		None => Err(not_found(id)),
	}
}

async fn search_memory(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let results = state.engine.router.search(&payload).await?;

	Ok(Json(SearchResponse { results }))
}

async fn update_memory(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(payload): Json<UpdateMemoryRequest>,
) -> Result<Json<UpdateReport>, ApiError> {
	let report = state.engine.router.update(id, payload.content, payload.metadata).await?;

	if !report.updated && report.attempts.iter().all(|attempt| attempt.succeeded()) {
		return Err(not_found(id));
	}

	Ok(Json(report))
}

async fn delete_memory(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Json<DeleteReport> {
	Json(state.engine.router.delete(id).await)
}

async fn put_item(
	State(state): State<AppState>,
	Path(kind): Path<StoreKind>,
	Json(item): Json<StoreItem>,
) -> Result<(StatusCode, Json<StoreReceipt>), ApiError> {
	let Some(store) = state.engine.content_store(kind) else {
		return Err(json_error(
			StatusCode::NOT_FOUND,
			"store_not_found",
			format!("Store {kind} is not available."),
			None,
		));
	};
	let receipt = store.put(item).await?;
	let status =
		if receipt.is_stored() { StatusCode::CREATED } else { StatusCode::SERVICE_UNAVAILABLE };

	Ok((status, Json(receipt)))
}

async fn rag_query(
	State(state): State<AppState>,
	Json(payload): Json<RagQuery>,
) -> Result<Json<RagResponse>, ApiError> {
	let response = state.engine.rag.query(&payload).await?;

	Ok(Json(response))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
	Json(MetricsResponse {
		router: state.engine.router.metrics(),
		facade: state.engine.facade.metrics(),
	})
}

async fn tiers(State(state): State<AppState>) -> Json<Vec<TierSnapshot>> {
	Json(state.engine.router.tier_snapshots())
}

async fn rag_metrics(State(state): State<AppState>) -> Json<RagMetrics> {
	Json(state.engine.rag.metrics())
}

async fn list_rules(State(state): State<AppState>) -> Json<RulesResponse> {
	Json(RulesResponse { rules: state.engine.router.rules() })
}

async fn register_rule(
	State(state): State<AppState>,
	Json(rule): Json<RoutingRule>,
) -> Result<(StatusCode, Json<RulesResponse>), ApiError> {
	state.engine.router.register_rule(rule)?;

	Ok((StatusCode::CREATED, Json(RulesResponse { rules: state.engine.router.rules() })))
}

async fn remove_rule(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
	state.engine.router.remove_rule(&id)?;

	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			ServiceError::InvalidRule(err) => json_error(
				StatusCode::UNPROCESSABLE_ENTITY,
				"invalid_rule",
				err.to_string(),
				None,
			),
			err @ ServiceError::RuleNotFound { .. } =>
				json_error(StatusCode::NOT_FOUND, "rule_not_found", err.to_string(), None),
			ServiceError::TierNotConfigured { tier } => json_error(
				StatusCode::SERVICE_UNAVAILABLE,
				"tier_not_configured",
				format!("Tier {tier} is not configured."),
				Some(vec![tier.to_string()]),
			),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

fn not_found(id: Uuid) -> ApiError {
	json_error(StatusCode::NOT_FOUND, "not_found", format!("Entry {id} was not found."), None)
}
