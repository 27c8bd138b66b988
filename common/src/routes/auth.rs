use axum::{ extract::{ rejection::JsonRejection, State }, http::StatusCode, Json };
use serde::Deserialize;
use tracing::{ error, info, warn };

use super::SharedState;
use crate::{
	error::ApiError,
	models::{ NewUser, RegisterUser, User },
	password::{ hash_password, verify_password },
	storage::{ MarketStorage, StorageError },
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub username: Option<String>,
	pub password: Option<String>,
}

// POST /api/auth/register
pub async fn register<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	payload: Result<Json<RegisterUser>, JsonRejection>
) -> Result<(StatusCode, Json<User>), ApiError> {
	let Json(body) = payload?;

	for (field, value) in [
		("username", &body.username),
		("password", &body.password),
		("email", &body.email),
	] {
		if value.trim().is_empty() {
			return Err(ApiError::Validation(format!("Validation error: {field} must not be empty")));
		}
	}

	let password_hash = hash_password(&body.password).map_err(|e| {
		error!("Password hashing failed: {}", e);
		ApiError::Internal("Error creating user")
	})?;

	let user = state.storage
		.create_user(NewUser {
			username: body.username,
			password_hash,
			email: body.email,
			role: body.role,
		}).await
		.map_err(|e| {
			if let StorageError::Conflict(reason) = &e {
				warn!(%reason, "registration rejected");
			}
			ApiError::storage("Error creating user")(e)
		})?;

	info!(user_id = user.id, role = user.role.as_str(), "user registered");
	Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/auth/login
pub async fn login<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	payload: Result<Json<LoginRequest>, JsonRejection>
) -> Result<Json<User>, ApiError> {
	let Json(body) = payload?;

	let (Some(username), Some(password)) = (
		body.username.filter(|u| !u.is_empty()),
		body.password.filter(|p| !p.is_empty()),
	) else {
		return Err(ApiError::Validation("Username and password are required".to_string()));
	};

	let user = state.storage
		.get_user_by_username(&username).await
		.map_err(ApiError::storage("Error during login"))?;

	let Some(user) = user else {
		warn!(%username, "login for unknown user");
		return Err(ApiError::Unauthorized);
	};

	let valid = verify_password(&password, &user.password_hash).map_err(|e| {
		error!(user_id = user.id, "Password verification failed: {}", e);
		ApiError::Internal("Error during login")
	})?;

	if !valid {
		warn!(user_id = user.id, "failed login attempt");
		return Err(ApiError::Unauthorized);
	}

	info!(user_id = user.id, "user logged in");
	Ok(Json(user))
}
