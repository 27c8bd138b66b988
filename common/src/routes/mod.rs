//! HTTP handlers, one submodule per resource. Mounted under `/api` by
//! [`crate::server::build_router`].

pub mod auth;
pub mod gpus;
pub mod jobs;
pub mod reviews;
pub mod transactions;

use std::sync::Arc;

use crate::{ error::ApiError, storage::MarketStorage };

// Shared state for the API
pub struct AppState<T: MarketStorage + 'static> {
	pub storage: Arc<T>,
}

pub type SharedState<T> = Arc<AppState<T>>;

/// Parse a numeric id from a path segment or query value.
pub(crate) fn parse_id(raw: &str, message: &'static str) -> Result<i64, ApiError> {
	raw.trim().parse::<i64>().map_err(|_| ApiError::BadRequest(message))
}

/// Query values that are present but empty count as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod test_support {
	use axum::{ body::Body, http::{ Request, StatusCode }, Router };
	use http_body_util::BodyExt;
	use serde_json::Value;
	use std::sync::Arc;
	use tower::ServiceExt;

	use crate::{ memory::MemStorage, server::build_router };

	pub fn app() -> Router {
		build_router(Arc::new(MemStorage::new()))
	}

	pub async fn send(
		app: &Router,
		method: &str,
		uri: &str,
		body: Option<Value>
	) -> (StatusCode, Value) {
		let builder = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(json) =>
				builder
					.header("content-type", "application/json")
					.body(Body::from(json.to_string()))
					.unwrap(),
			None => builder.body(Body::empty()).unwrap(),
		};

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	pub async fn send_raw(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap();
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		(status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
	}
}
