use axum::{
	extract::{ rejection::{ JsonRejection, QueryRejection }, Path, Query, State },
	http::StatusCode,
	Json,
};
use serde::Deserialize;
use tracing::info;

use super::{ non_empty, parse_id, SharedState };
use crate::{
	error::ApiError,
	models::{ NewTransaction, Transaction, TransactionPatch },
	storage::MarketStorage,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
	pub user_id: Option<String>,
}

// GET /api/transactions?userId=
pub async fn list<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	query: Result<Query<TransactionsQuery>, QueryRejection>
) -> Result<Json<Vec<Transaction>>, ApiError> {
	let Query(query) = query?;

	let raw = non_empty(query.user_id).ok_or(ApiError::BadRequest("User ID is required"))?;
	let user_id = parse_id(&raw, "Invalid user ID")?;

	let transactions = state.storage
		.get_transactions_by_user_id(user_id).await
		.map_err(ApiError::storage("Error retrieving transactions"))?;
	Ok(Json(transactions))
}

// POST /api/transactions
pub async fn create<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	payload: Result<Json<NewTransaction>, JsonRejection>
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
	let Json(transaction) = payload?;

	let transaction = state.storage
		.create_transaction(transaction).await
		.map_err(ApiError::storage("Error creating transaction"))?;

	info!(
		transaction_id = transaction.id,
		user_id = transaction.user_id,
		kind = transaction.kind.as_str(),
		amount = transaction.amount,
		"transaction recorded"
	);
	Ok((StatusCode::CREATED, Json(transaction)))
}

// PUT /api/transactions/:id
pub async fn update<T: MarketStorage + 'static>(
	State(state): State<SharedState<T>>,
	Path(id): Path<String>,
	payload: Result<Json<TransactionPatch>, JsonRejection>
) -> Result<Json<Transaction>, ApiError> {
	let id = parse_id(&id, "Invalid transaction ID")?;
	let Json(patch) = payload?;

	let transaction = state.storage
		.update_transaction(id, patch).await
		.map_err(ApiError::storage("Error updating transaction"))?
		.ok_or(ApiError::NotFound("Transaction not found"))?;

	info!(transaction_id = id, status = transaction.status.as_str(), "transaction updated");
	Ok(Json(transaction))
}
