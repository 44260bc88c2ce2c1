use axum::{
	Json, Router,
	extract::{Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use souk_domain::{ProductId, Subject};
use souk_service::{
	CHECKOUT_WEIGHT, HomeSectionsResponse, RecommendResponse, ServiceError, VIEW_WEIGHT,
};

use crate::state::AppState;

/// Identity header set by the fronting auth layer; absent or malformed
/// values resolve to the anonymous subject.
pub const USER_ID_HEADER: &str = "x-souk-user-id";

const DEFAULT_COUNT: usize = 5;
const DEFAULT_PER_SECTION: usize = 4;
const MAX_COUNT: usize = 50;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/recommendations", get(recommendations))
		.route("/v1/home/sections", get(home_sections))
		.route("/v1/interest/product", post(product_interest))
		.route("/v1/interest/cart", post(cart_interest))
		.route("/v1/likes/toggle", post(toggle_like))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
struct RecommendationsQuery {
	n: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SectionsQuery {
	n: Option<usize>,
	per_section: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ProductInterestBody {
	product_id: ProductId,
	weight: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CartInterestBody {
	weight: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ToggleLikeBody {
	product_id: ProductId,
}

#[derive(Debug, Serialize)]
struct ToggleLikeResponse {
	liked: bool,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn recommendations(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<RecommendationsQuery>,
) -> Result<Json<RecommendResponse>, ApiError> {
	let n = bounded_count(query.n, DEFAULT_COUNT)?;
	let response = state.service.recommendations(subject_from(&headers), n).await?;

	Ok(Json(response))
}

async fn home_sections(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<SectionsQuery>,
) -> Result<Json<HomeSectionsResponse>, ApiError> {
	let n = bounded_count(query.n, DEFAULT_COUNT)?;
	let per_section = bounded_count(query.per_section, DEFAULT_PER_SECTION)?;
	let response =
		state.service.home_sections(subject_from(&headers), n, per_section).await?;

	Ok(Json(response))
}

async fn product_interest(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<ProductInterestBody>,
) -> Result<StatusCode, ApiError> {
	state
		.service
		.record_product_interest(
			subject_from(&headers),
			payload.product_id,
			payload.weight.unwrap_or(VIEW_WEIGHT),
		)
		.await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn cart_interest(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<CartInterestBody>,
) -> Result<StatusCode, ApiError> {
	state
		.service
		.record_cart_interest(subject_from(&headers), payload.weight.unwrap_or(CHECKOUT_WEIGHT))
		.await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn toggle_like(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<ToggleLikeBody>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
	let liked = state.service.toggle_like(subject_from(&headers), payload.product_id).await?;

	Ok(Json(ToggleLikeResponse { liked }))
}

fn subject_from(headers: &HeaderMap) -> Subject {
	let user_id = headers
		.get(USER_ID_HEADER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.trim().parse().ok());

	Subject::from_user_id(user_id)
}

fn bounded_count(requested: Option<usize>, default: usize) -> Result<usize, ApiError> {
	let count = requested.unwrap_or(default);

	if count > MAX_COUNT {
		return Err(ApiError::new(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			format!("Requested count exceeds the maximum of {MAX_COUNT}."),
		));
	}

	Ok(count)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::Storage { message } => {
				tracing::error!(%message, "Storage failure on the recommendation path.");

				Self::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"storage",
					"Storage is unavailable.",
				)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
