use axum::{
	extract::{ rejection::{ JsonRejection, QueryRejection }, Path, Query, State },
	http::StatusCode,
	Json,
};
use serde::Deserialize;
use tracing::{ debug, info };

use super::{ non_empty, parse_id, SharedState };
use crate::{
	error::ApiError,
	models::{ Job, JobPatch, NewJob },
	storage::MarketStorage,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsQuery {
	pub client_id: Option<String>,
	pub gpu_id: Option<String>,
}

// GET /api/jobs?clientId=|gpuId=
pub async fn list<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	query: Result<Query<JobsQuery>, QueryRejection>
) -> Result<Json<Vec<Job>>, ApiError> {
	let Query(query) = query?;
	// There is no unscoped listing; one owner filter is required and clientId wins.
	let jobs = if let Some(raw) = non_empty(query.client_id) {
		let client_id = parse_id(&raw, "Invalid client ID")?;
		state.storage.get_jobs_by_client_id(client_id).await
	} else if let Some(raw) = non_empty(query.gpu_id) {
		let gpu_id = parse_id(&raw, "Invalid GPU ID")?;
		state.storage.get_jobs_by_gpu_id(gpu_id).await
	} else {
		return Err(ApiError::BadRequest("Must specify clientId or gpuId"));
	};

	let jobs = jobs.map_err(ApiError::storage("Error retrieving jobs"))?;
	debug!(count = jobs.len(), "listed jobs");
	Ok(Json(jobs))
}

// GET /api/jobs/:id
pub async fn get<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	Path(id): Path<String>
) -> Result<Json<Job>, ApiError> {
	let id = parse_id(&id, "Invalid job ID")?;

	state.storage
		.get_job(id).await
		.map_err(ApiError::storage("Error retrieving job"))?
		.map(Json)
		.ok_or(ApiError::NotFound("Job not found"))
}

// POST /api/jobs
pub async fn create<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	payload: Result<Json<NewJob>, JsonRejection>
) -> Result<(StatusCode, Json<Job>), ApiError> {
	let Json(job) = payload?;

	let job = state.storage.create_job(job).await.map_err(ApiError::storage("Error creating job"))?;

	info!(job_id = job.id, client_id = job.client_id, gpu_id = job.gpu_id, "job submitted");
	Ok((StatusCode::CREATED, Json(job)))
}

// PUT /api/jobs/:id
pub async fn update<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	Path(id): Path<String>,
	payload: Result<Json<JobPatch>, JsonRejection>
) -> Result<Json<Job>, ApiError> {
	let id = parse_id(&id, "Invalid job ID")?;
	let Json(patch) = payload?;

	let job = state.storage
		.update_job(id, patch).await
		.map_err(ApiError::storage("Error updating job"))?
		.ok_or(ApiError::NotFound("Job not found"))?;

	info!(job_id = id, status = job.status.as_str(), "job updated");
	Ok(Json(job))
}

#[cfg(test)]
mod tests {
	use axum::http::StatusCode;
	use serde_json::json;

	use crate::routes::test_support::{ app, send };

	#[tokio::test]
	async fn create_defaults_status_and_runtime_fields() {
		let app = app();
		let (status, job) = send(
			&app,
			"POST",
			"/api/jobs",
			Some(json!({ "clientId": 5, "gpuId": 2, "jobConfig": { "runtime": "pytorch", "estimatedTime": 3 } }))
		).await;

		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(job["status"], "pending");
		assert_eq!(job["jobConfig"]["runtime"], "pytorch");
		assert!(job["startTime"].is_null());
		assert!(job["totalCost"].is_null());
		assert!(job["resultsUrl"].is_null());
	}

	#[tokio::test]
	async fn listing_requires_an_owner_filter() {
		let app = app();
		let (status, body) = send(&app, "GET", "/api/jobs", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Must specify clientId or gpuId");

		let (status, body) = send(&app, "GET", "/api/jobs?clientId=me", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Invalid client ID");

		let (status, body) = send(&app, "GET", "/api/jobs?gpuId=x", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Invalid GPU ID");
	}

	#[tokio::test]
	async fn listing_by_client_or_gpu() {
		let app = app();
		for (client, gpu) in [(1, 10), (1, 11), (2, 10)] {
			send(&app, "POST", "/api/jobs", Some(json!({ "clientId": client, "gpuId": gpu }))).await;
		}

		let (_, by_client) = send(&app, "GET", "/api/jobs?clientId=1", None).await;
		assert_eq!(by_client.as_array().unwrap().len(), 2);

		let (_, by_gpu) = send(&app, "GET", "/api/jobs?gpuId=10", None).await;
		assert_eq!(by_gpu.as_array().unwrap().len(), 2);

		// clientId takes precedence when both are given
		let (_, both) = send(&app, "GET", "/api/jobs?clientId=2&gpuId=11", None).await;
		let both = both.as_array().unwrap();
		assert_eq!(both.len(), 1);
		assert_eq!(both[0]["clientId"], 2);

		let (status, none) = send(&app, "GET", "/api/jobs?clientId=3", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(none, json!([]));
	}

	#[tokio::test]
	async fn status_updates_are_unconstrained() {
		let app = app();
		send(&app, "POST", "/api/jobs", Some(json!({ "clientId": 1, "gpuId": 1, "status": "completed" }))).await;

		let (status, job) = send(
			&app,
			"PUT",
			"/api/jobs/1",
			Some(
				json!({
				"status": "running",
				"startTime": "2025-01-01T10:00:00Z",
				"totalCost": 4.2
			})
			)
		).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(job["status"], "running");
		assert_eq!(job["startTime"], "2025-01-01T10:00:00Z");
		assert_eq!(job["totalCost"], 4.2);
		assert_eq!(job["clientId"], 1);
	}

	#[tokio::test]
	async fn repeated_filter_key_is_a_json_validation_error() {
		let app = app();
		let (status, body) = send(&app, "GET", "/api/jobs?clientId=1&clientId=2", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		let message = body["message"].as_str().unwrap();
		assert!(message.starts_with("Validation error"), "{message}");
	}

	#[tokio::test]
	async fn get_and_update_missing_job() {
		let app = app();
		let (status, body) = send(&app, "GET", "/api/jobs/7", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["message"], "Job not found");

		let (status, _) = send(&app, "PUT", "/api/jobs/7", Some(json!({ "status": "failed" }))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, body) = send(&app, "GET", "/api/jobs/seven", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["message"], "Invalid job ID");
	}

	#[tokio::test]
	async fn unknown_status_is_a_validation_error() {
		let app = app();
		let (status, _) = send(
			&app,
			"POST",
			"/api/jobs",
			Some(json!({ "clientId": 1, "gpuId": 1, "status": "paused" }))
		).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}
}
