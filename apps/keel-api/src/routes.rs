use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;
use keel_domain::{CallRiskInput, CallStatus};
use keel_service::{
	AnalyzeResponse, CallView, ChatRequest, ChatResponse, Error as ServiceError, SeedReport,
	SeedRequest, StatusUpdateResponse,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/call/analyze", post(analyze_call))
		.route("/v1/chat", post(chat))
		.route("/v1/call/{call_id}", get(get_call))
		.route("/v1/call/{call_id}/status", post(update_status))
		.route("/v1/call/{call_id}/audit", get(get_audit_trail))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/seed_knowledge", post(seed_knowledge)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn analyze_call(
	State(state): State<AppState>,
	Json(payload): Json<CallRiskInput>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
	let response = state.service.analyze_call(payload).await?;
	Ok(Json(response))
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	let response = state.service.chat(payload).await?;
	Ok(Json(response))
}

async fn get_call(
	State(state): State<AppState>,
	Path(call_id): Path<String>,
) -> Result<Json<CallView>, ApiError> {
	let response = state.service.get_call(&call_id).await?;
	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
	status: CallStatus,
}

async fn update_status(
	State(state): State<AppState>,
	Path(call_id): Path<String>,
	Json(body): Json<StatusUpdate>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
	let response = state.service.update_status(&call_id, body.status).await?;
	Ok(Json(response))
}

async fn get_audit_trail(
	State(state): State<AppState>,
	Path(call_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
	let response = state.service.get_audit_trail(&call_id).await?;
	Ok(Json(response))
}

async fn seed_knowledge(
	State(state): State<AppState>,
	Json(payload): Json<SeedRequest>,
) -> Result<Json<SeedReport>, ApiError> {
	let response = state.service.seed_knowledge(payload).await?;
	Ok(Json(response))
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
			ServiceError::InvalidRequest { message, fields } => Self::new(
				StatusCode::UNPROCESSABLE_ENTITY,
				"validation_error",
				message,
				if fields.is_empty() { None } else { Some(fields) },
			),
			ServiceError::NotReady => Self::new(
				StatusCode::SERVICE_UNAVAILABLE,
				"knowledge_base_not_ready",
				"Knowledge base is not seeded yet.",
				None,
			),
			ServiceError::NotFound { message } =>
				Self::new(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::Dependency { message } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "dependency_error", message, None),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code,
			message: self.message,
			fields: self.fields,
		};

		(self.status, Json(body)).into_response()
	}
}
