use axum::{
	extract::rejection::{ JsonRejection, QueryRejection },
	http::StatusCode,
	response::{ IntoResponse, Response },
	Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
	/// Request body did not match the schema
	#[error("{0}")]
	Validation(String),

	/// Bad path or query parameter
	#[error("{0}")]
	BadRequest(&'static str),

	/// Unique field already taken
	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	NotFound(&'static str),

	#[error("Invalid credentials")]
	Unauthorized,

	/// Anything else. The message is generic; the cause only goes to the log.
	#[error("{0}")]
	Internal(&'static str),
}

impl ApiError {
	pub fn status(&self) -> StatusCode {
		match self {
			ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Conflict(_) =>
				StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Build a mapper from a storage failure to this route's 500 message.
	/// Conflicts keep their own message and status.
	pub fn storage(context: &'static str) -> impl FnOnce(StorageError) -> ApiError {
		move |e| match e {
			StorageError::Conflict(message) => ApiError::Conflict(message),
			other => {
				error!(error = %other, "{context}");
				ApiError::Internal(context)
			}
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status(), Json(json!({ "message": self.to_string() }))).into_response()
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		ApiError::Validation(format!("Validation error: {}", rejection.body_text()))
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		ApiError::Validation(format!("Validation error: {}", rejection.body_text()))
	}
}
