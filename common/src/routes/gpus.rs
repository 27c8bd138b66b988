use axum::{
	extract::{ rejection::{ JsonRejection, QueryRejection }, Path, Query, State },
	http::StatusCode,
	Json,
};
use tracing::{ debug, info };

use super::{ non_empty, parse_id, SharedState };
use crate::{
	error::ApiError,
	models::{ Gpu, GpuFilter, GpuPatch, NewGpu },
	storage::MarketStorage,
};

/// Raw `/gpus` query string. Values are parsed leniently: anything that does
/// not parse is treated as if it were absent.
#[derive(Debug, Default)]
pub struct GpuQuery {
	pub is_online: Option<String>,
	pub name: Option<String>,
	pub min_vram: Option<String>,
	pub max_price: Option<String>,
	pub provider_id: Option<String>,
}

impl GpuQuery {
	/// Collect known keys from decoded query pairs. A repeated key keeps its
	/// first value; unknown keys are ignored.
	pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
		let mut query = GpuQuery::default();
		for (key, value) in pairs {
			let slot = match key.as_str() {
				"isOnline" => &mut query.is_online,
				"name" => &mut query.name,
				"minVram" => &mut query.min_vram,
				"maxPrice" => &mut query.max_price,
				"providerId" => &mut query.provider_id,
				_ => {
					continue;
				}
			};
			if slot.is_none() {
				*slot = Some(value);
			}
		}
		query
	}
}

impl From<GpuQuery> for GpuFilter {
	fn from(query: GpuQuery) -> Self {
		GpuFilter {
			is_online: match query.is_online.as_deref() {
				Some("true") => Some(true),
				Some("false") => Some(false),
				_ => None,
			},
			name: non_empty(query.name),
			min_vram: query.min_vram.and_then(|v| v.trim().parse().ok()),
			max_price: query.max_price
				.and_then(|v| v.trim().parse::<f64>().ok())
				.filter(|v| v.is_finite()),
			provider_id: query.provider_id.and_then(|v| v.trim().parse().ok()),
		}
	}
}

// GET /api/gpus
pub async fn list<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	query: Result<Query<Vec<(String, String)>>, QueryRejection>
) -> Result<Json<Vec<Gpu>>, ApiError> {
	let Query(pairs) = query?;
	let filter = GpuFilter::from(GpuQuery::from_pairs(pairs));
	let gpus = state.storage
		.get_gpus(&filter).await
		.map_err(ApiError::storage("Error retrieving GPUs"))?;

	debug!(?filter, count = gpus.len(), "listed gpus");
	Ok(Json(gpus))
}

// GET /api/gpus/:id
pub async fn get<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	Path(id): Path<String>
) -> Result<Json<Gpu>, ApiError> {
	let id = parse_id(&id, "Invalid GPU ID")?;

	state.storage
		.get_gpu(id).await
		.map_err(ApiError::storage("Error retrieving GPU"))?
		.map(Json)
		.ok_or(ApiError::NotFound("GPU not found"))
}

// POST /api/gpus
pub async fn create<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	payload: Result<Json<NewGpu>, JsonRejection>
) -> Result<(StatusCode, Json<Gpu>), ApiError> {
	let Json(gpu) = payload?;

	let gpu = state.storage.create_gpu(gpu).await.map_err(ApiError::storage("Error creating GPU"))?;

	info!(gpu_id = gpu.id, provider_id = gpu.provider_id, "gpu listed");
	Ok((StatusCode::CREATED, Json(gpu)))
}

// PUT /api/gpus/:id
pub async fn update<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	Path(id): Path<String>,
	payload: Result<Json<GpuPatch>, JsonRejection>
) -> Result<Json<Gpu>, ApiError> {
	let id = parse_id(&id, "Invalid GPU ID")?;
	let Json(patch) = payload?;

	let gpu = state.storage
		.update_gpu(id, patch).await
		.map_err(ApiError::storage("Error updating GPU"))?
		.ok_or(ApiError::NotFound("GPU not found"))?;

	info!(gpu_id = id, "gpu updated");
	Ok(Json(gpu))
}

// DELETE /api/gpus/:id
pub async fn delete<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	Path(id): Path<String>
) -> Result<StatusCode, ApiError> {
	let id = parse_id(&id, "Invalid GPU ID")?;

	let existed = state.storage.delete_gpu(id).await.map_err(ApiError::storage("Error deleting GPU"))?;
	if !existed {
		return Err(ApiError::NotFound("GPU not found"));
	}

	info!(gpu_id = id, "gpu removed");
	Ok(StatusCode::NO_CONTENT)
}
