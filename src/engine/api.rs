//! Gateway API Module
//! REST API server with OpenAPI documentation

use axum::{
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use utoipa::OpenApi;

use super::gateway::{AccessGateway, GatewayError, PageParams, PatientPage, DEFAULT_PAGE_LIMIT};
use super::token::{Claims, TokenError, TokenService};

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<AccessGateway>,
    pub tokens: Arc<TokenService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_token,
        get_patients,
        download_patients,
    ),
    tags(
        (name = "auth", description = "Token issuance (dev/test only)"),
        (name = "patients", description = "Role-gated patient data access"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/token", post(generate_token))
        .route("/patients", get(get_patients))
        .route("/download/patients", get(download_patients))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Client-visible faults, mapped to stable reason codes. Internal detail is
/// never leaked; authentication and authorization stay distinguishable.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(&'static str),
    Forbidden,
    BadRequest(String),
    Validation(String),
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match self {
            ApiError::Unauthenticated(detail) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", detail.to_string())
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", "Forbidden".to_string()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "bad_request", detail),
            ApiError::Validation(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation", detail)
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "Internal server error".to_string(),
            ),
        };
        (status, Json(json!({ "error": code, "detail": detail }))).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Forbidden { .. } => ApiError::Forbidden,
            GatewayError::InvalidPage(detail) => ApiError::Validation(detail),
            GatewayError::DataSource(e) => {
                error!("data source fault: {e}");
                ApiError::Internal
            }
            GatewayError::Query(e) => {
                error!("data source fault: {e}");
                ApiError::Internal
            }
            GatewayError::Audit(e) => {
                // Fail closed: no audit record, no data.
                error!("audit write fault: {e}");
                ApiError::Internal
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::Unauthenticated("Token expired"),
            TokenError::Malformed => ApiError::Unauthenticated("Invalid token"),
            TokenError::InvalidRole => {
                ApiError::BadRequest(TokenError::InvalidRole.to_string())
            }
        }
    }
}

/// Extracts and validates the bearer token, yielding its claims. A missing
/// or bad token never reaches a handler, and never touches the audit trail.
pub struct BearerClaims(pub Claims);

impl FromRequestParts<ApiState> for BearerClaims {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated("Missing bearer token"))?;

        let claims = state.tokens.validate(token)?;
        Ok(BearerClaims(claims))
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub role: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[utoipa::path(
    post,
    path = "/token",
    request_body = Value,
    responses(
        (status = 200, description = "Signed bearer token", body = Value),
        (status = 400, description = "Unrecognized role")
    ),
    tag = "auth"
)]
async fn generate_token(
    State(state): State<ApiState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let access_token = state.tokens.issue(&req.role)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[utoipa::path(
    get,
    path = "/patients",
    params(
        ("limit" = i64, Query, description = "Records per page (1-100, default 10)"),
        ("offset" = i64, Query, description = "Records to skip (default 0)"),
    ),
    responses(
        (status = 200, description = "One page of the caller's view", body = Value),
        (status = 401, description = "Missing, invalid, or expired token"),
        (status = 403, description = "Role has no view binding"),
    ),
    tag = "patients"
)]
async fn get_patients(
    State(state): State<ApiState>,
    BearerClaims(claims): BearerClaims,
    Query(params): Query<ListParams>,
) -> Result<Json<PatientPage>, ApiError> {
    let page = state.gateway.list_patients(
        &claims,
        PageParams {
            limit: params.limit,
            offset: params.offset,
        },
    )?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/download/patients",
    responses(
        (status = 200, description = "Entire view as a CSV attachment", body = String),
        (status = 401, description = "Missing, invalid, or expired token"),
        (status = 403, description = "Role has no view binding"),
    ),
    tag = "patients"
)]
async fn download_patients(
    State(state): State<ApiState>,
    BearerClaims(claims): BearerClaims,
) -> Result<Response, ApiError> {
    let export = state.gateway.export_patients(&claims)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", export.filename),
            ),
        ],
        export.content,
    )
        .into_response())
}
