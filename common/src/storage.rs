use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
	Gpu,
	GpuFilter,
	GpuPatch,
	Job,
	JobPatch,
	NewGpu,
	NewJob,
	NewReview,
	NewTransaction,
	NewUser,
	Review,
	Transaction,
	TransactionPatch,
	User,
};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
	/// A unique field (username, email) is already taken.
	#[error("{0}")]
	Conflict(String),

	#[error("storage backend error: {0}")]
	Backend(String),

	#[error("corrupt record: {0}")]
	Corrupt(String),
}

impl StorageError {
	pub fn duplicate_username() -> Self {
		Self::Conflict("Username already exists".to_string())
	}

	pub fn duplicate_email() -> Self {
		Self::Conflict("Email already exists".to_string())
	}
}

/// Persistence facade for the marketplace entities.
///
/// Lookups return `Ok(None)` when the id is absent; updates likewise return
/// `Ok(None)` instead of inserting. Listing methods return rows in id order.
#[async_trait]
pub trait MarketStorage: Send + Sync {
	/// Backend name, used in logs
	fn backend_name(&self) -> &'static str;

	async fn get_user(&self, id: i64) -> StorageResult<Option<User>>;

	/// Case-insensitive lookup
	async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;

	/// Case-insensitive lookup
	async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;

	/// Insert a user. Fails with `StorageError::Conflict` when the username or
	/// email is already registered (compared case-insensitively). The check and
	/// the insert are a single atomic step.
	async fn create_user(&self, user: NewUser) -> StorageResult<User>;

	async fn get_gpu(&self, id: i64) -> StorageResult<Option<Gpu>>;

	async fn get_gpus(&self, filter: &GpuFilter) -> StorageResult<Vec<Gpu>>;

	async fn get_gpus_by_provider_id(&self, provider_id: i64) -> StorageResult<Vec<Gpu>> {
		self.get_gpus(&(GpuFilter { provider_id: Some(provider_id), ..Default::default() })).await
	}

	async fn create_gpu(&self, gpu: NewGpu) -> StorageResult<Gpu>;

	async fn update_gpu(&self, id: i64, patch: GpuPatch) -> StorageResult<Option<Gpu>>;

	/// Returns true if the GPU existed
	async fn delete_gpu(&self, id: i64) -> StorageResult<bool>;

	async fn get_job(&self, id: i64) -> StorageResult<Option<Job>>;

	async fn get_jobs_by_client_id(&self, client_id: i64) -> StorageResult<Vec<Job>>;

	async fn get_jobs_by_gpu_id(&self, gpu_id: i64) -> StorageResult<Vec<Job>>;

	async fn create_job(&self, job: NewJob) -> StorageResult<Job>;

	async fn update_job(&self, id: i64, patch: JobPatch) -> StorageResult<Option<Job>>;

	async fn get_review(&self, id: i64) -> StorageResult<Option<Review>>;

	async fn get_reviews_by_gpu_id(&self, gpu_id: i64) -> StorageResult<Vec<Review>>;

	async fn create_review(&self, review: NewReview) -> StorageResult<Review>;

	async fn get_transaction(&self, id: i64) -> StorageResult<Option<Transaction>>;

	async fn get_transactions_by_user_id(&self, user_id: i64) -> StorageResult<Vec<Transaction>>;

	async fn create_transaction(&self, transaction: NewTransaction) -> StorageResult<Transaction>;

	async fn update_transaction(
		&self,
		id: i64,
		patch: TransactionPatch
	) -> StorageResult<Option<Transaction>>;
}
