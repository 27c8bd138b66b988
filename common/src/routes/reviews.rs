use axum::{ extract::{ rejection::{ JsonRejection, QueryRejection }, Query, State }, http::StatusCode, Json };
use serde::Deserialize;
use tracing::info;

use super::{ non_empty, parse_id, SharedState };
use crate::{ error::ApiError, models::{ NewReview, Review }, storage::MarketStorage };

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
	pub gpu_id: Option<String>,
}

// GET /api/reviews?gpuId=
pub async fn list<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	query: Result<Query<ReviewsQuery>, QueryRejection>
) -> Result<Json<Vec<Review>>, ApiError> {
	let Query(query) = query?;

	let raw = non_empty(query.gpu_id).ok_or(ApiError::BadRequest("GPU ID is required"))?;
	let gpu_id = parse_id(&raw, "Invalid GPU ID")?;

	let reviews = state.storage
		.get_reviews_by_gpu_id(gpu_id).await
		.map_err(ApiError::storage("Error retrieving reviews"))?;
	Ok(Json(reviews))
}

// POST /api/reviews
pub async fn create<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	payload: Result<Json<NewReview>, JsonRejection>
) -> Result<(StatusCode, Json<Review>), ApiError> {
	let Json(review) = payload?;

	let review = state.storage
		.create_review(review).await
		.map_err(ApiError::storage("Error creating review"))?;

	info!(review_id = review.id, gpu_id = review.gpu_id, rating = review.rating, "review posted");
	Ok((StatusCode::CREATED, Json(review)))
}
