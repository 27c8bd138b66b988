use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

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
use crate::storage::{ MarketStorage, StorageError, StorageResult };

// Each table pairs its rows with the next id to hand out.
struct Table<T> {
	rows: BTreeMap<i64, T>,
	next_id: i64,
}

impl<T: Clone> Table<T> {
	fn new() -> Self {
		Self { rows: BTreeMap::new(), next_id: 1 }
	}

	fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> T {
		let id = self.next_id;
		self.next_id += 1;
		let row = build(id);
		self.rows.insert(id, row.clone());
		row
	}

	fn get(&self, id: i64) -> Option<T> {
		self.rows.get(&id).cloned()
	}

	fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
		self.rows
			.values()
			.filter(|row| pred(row))
			.cloned()
			.collect()
	}

	fn update(&mut self, id: i64, merge: impl FnOnce(&mut T)) -> Option<T> {
		let row = self.rows.get_mut(&id)?;
		merge(row);
		Some(row.clone())
	}
}

struct Tables {
	users: Table<User>,
	gpus: Table<Gpu>,
	jobs: Table<Job>,
	reviews: Table<Review>,
	transactions: Table<Transaction>,
}

/// Process-local storage. State lives as long as the value does.
pub struct MemStorage {
	tables: Mutex<Tables>,
}

impl MemStorage {
	pub fn new() -> Self {
		Self {
			tables: Mutex::new(Tables {
				users: Table::new(),
				gpus: Table::new(),
				jobs: Table::new(),
				reviews: Table::new(),
				transactions: Table::new(),
			}),
		}
	}
}

impl Default for MemStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl MarketStorage for MemStorage {
	fn backend_name(&self) -> &'static str {
		"memory"
	}

	async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
		Ok(self.tables.lock().await.users.get(id))
	}

	async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
		let tables = self.tables.lock().await;
		Ok(
			tables.users.rows
				.values()
				.find(|u| u.username.eq_ignore_ascii_case(username))
				.cloned()
		)
	}

	async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
		let tables = self.tables.lock().await;
		Ok(
			tables.users.rows
				.values()
				.find(|u| u.email.eq_ignore_ascii_case(email))
				.cloned()
		)
	}

	async fn create_user(&self, user: NewUser) -> StorageResult<User> {
		// Check and insert under one lock so concurrent registrations serialize.
		let mut tables = self.tables.lock().await;
		let users = tables.users.rows.values();
		for existing in users {
			if existing.username.eq_ignore_ascii_case(&user.username) {
				return Err(StorageError::duplicate_username());
			}
			if existing.email.eq_ignore_ascii_case(&user.email) {
				return Err(StorageError::duplicate_email());
			}
		}

		let created = tables.users.insert_with(|id| User {
			id,
			username: user.username,
			password_hash: user.password_hash,
			email: user.email,
			role: user.role,
			created_at: Utc::now(),
		});
		debug!(id = created.id, "user inserted");
		Ok(created)
	}

	async fn get_gpu(&self, id: i64) -> StorageResult<Option<Gpu>> {
		Ok(self.tables.lock().await.gpus.get(id))
	}

	async fn get_gpus(&self, filter: &GpuFilter) -> StorageResult<Vec<Gpu>> {
		Ok(self.tables.lock().await.gpus.filter(|gpu| filter.matches(gpu)))
	}

	async fn create_gpu(&self, gpu: NewGpu) -> StorageResult<Gpu> {
		let mut tables = self.tables.lock().await;
		Ok(
			tables.gpus.insert_with(|id| Gpu {
				id,
				provider_id: gpu.provider_id,
				name: gpu.name,
				vram: gpu.vram,
				cores: gpu.cores,
				tensor_score: gpu.tensor_score,
				price_per_hour: gpu.price_per_hour,
				is_online: gpu.is_online,
				description: gpu.description,
				specifications: gpu.specifications,
				image_url: gpu.image_url,
				created_at: Utc::now(),
			})
		)
	}

	async fn update_gpu(&self, id: i64, patch: GpuPatch) -> StorageResult<Option<Gpu>> {
		Ok(self.tables.lock().await.gpus.update(id, |gpu| gpu.apply(patch)))
	}

	async fn delete_gpu(&self, id: i64) -> StorageResult<bool> {
		Ok(self.tables.lock().await.gpus.rows.remove(&id).is_some())
	}

	async fn get_job(&self, id: i64) -> StorageResult<Option<Job>> {
		Ok(self.tables.lock().await.jobs.get(id))
	}

	async fn get_jobs_by_client_id(&self, client_id: i64) -> StorageResult<Vec<Job>> {
		Ok(self.tables.lock().await.jobs.filter(|job| job.client_id == client_id))
	}

	async fn get_jobs_by_gpu_id(&self, gpu_id: i64) -> StorageResult<Vec<Job>> {
		Ok(self.tables.lock().await.jobs.filter(|job| job.gpu_id == gpu_id))
	}

	async fn create_job(&self, job: NewJob) -> StorageResult<Job> {
		let mut tables = self.tables.lock().await;
		Ok(
			tables.jobs.insert_with(|id| Job {
				id,
				client_id: job.client_id,
				gpu_id: job.gpu_id,
				status: job.status,
				start_time: None,
				end_time: None,
				total_cost: None,
				job_config: job.job_config,
				results_url: None,
				created_at: Utc::now(),
			})
		)
	}

	async fn update_job(&self, id: i64, patch: JobPatch) -> StorageResult<Option<Job>> {
		Ok(self.tables.lock().await.jobs.update(id, |job| job.apply(patch)))
	}

	async fn get_review(&self, id: i64) -> StorageResult<Option<Review>> {
		Ok(self.tables.lock().await.reviews.get(id))
	}

	async fn get_reviews_by_gpu_id(&self, gpu_id: i64) -> StorageResult<Vec<Review>> {
		Ok(self.tables.lock().await.reviews.filter(|review| review.gpu_id == gpu_id))
	}

	async fn create_review(&self, review: NewReview) -> StorageResult<Review> {
		let mut tables = self.tables.lock().await;
		Ok(
			tables.reviews.insert_with(|id| Review {
				id,
				user_id: review.user_id,
				gpu_id: review.gpu_id,
				rating: review.rating,
				comment: review.comment,
				created_at: Utc::now(),
			})
		)
	}

	async fn get_transaction(&self, id: i64) -> StorageResult<Option<Transaction>> {
		Ok(self.tables.lock().await.transactions.get(id))
	}

	async fn get_transactions_by_user_id(&self, user_id: i64) -> StorageResult<Vec<Transaction>> {
		Ok(self.tables.lock().await.transactions.filter(|t| t.user_id == user_id))
	}

	async fn create_transaction(&self, transaction: NewTransaction) -> StorageResult<Transaction> {
		let mut tables = self.tables.lock().await;
		Ok(
			tables.transactions.insert_with(|id| Transaction {
				id,
				user_id: transaction.user_id,
				job_id: transaction.job_id,
				amount: transaction.amount,
				kind: transaction.kind,
				status: transaction.status,
				created_at: Utc::now(),
			})
		)
	}

	async fn update_transaction(
		&self,
		id: i64,
		patch: TransactionPatch
	) -> StorageResult<Option<Transaction>> {
		Ok(self.tables.lock().await.transactions.update(id, |t| t.apply(patch)))
	}
}
