use std::{ path::Path, time::Duration };

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use common::{
	models::{
		Gpu,
		GpuFilter,
		GpuPatch,
		Job,
		JobPatch,
		JobStatus,
		NewGpu,
		NewJob,
		NewReview,
		NewTransaction,
		NewUser,
		Review,
		Role,
		Transaction,
		TransactionPatch,
		TransactionStatus,
		TransactionType,
		User,
	},
	storage::{ MarketStorage, StorageError, StorageResult },
};
use rusqlite::{
	functions::FunctionFlags,
	params,
	params_from_iter,
	types::Type,
	ErrorCode,
	OptionalExtension,
	Row,
};
use tokio_rusqlite::Connection as AsyncConnection;
use tracing::{ debug, info };

const SCHEMA: &str =
	"
	CREATE TABLE IF NOT EXISTS users (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		username TEXT NOT NULL UNIQUE COLLATE NOCASE,
		password_hash TEXT NOT NULL,
		email TEXT NOT NULL UNIQUE COLLATE NOCASE,
		role TEXT NOT NULL DEFAULT 'client',
		created_at TEXT NOT NULL
	);

	CREATE TABLE IF NOT EXISTS gpus (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		provider_id INTEGER NOT NULL,
		name TEXT NOT NULL,
		vram INTEGER NOT NULL,
		cores INTEGER NOT NULL,
		tensor_score REAL NOT NULL,
		price_per_hour REAL NOT NULL,
		is_online INTEGER NOT NULL DEFAULT 0,
		description TEXT,
		specifications TEXT,
		image_url TEXT,
		created_at TEXT NOT NULL
	);

	CREATE TABLE IF NOT EXISTS jobs (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		client_id INTEGER NOT NULL,
		gpu_id INTEGER NOT NULL,
		status TEXT NOT NULL DEFAULT 'pending',
		start_time TEXT,
		end_time TEXT,
		total_cost REAL,
		job_config TEXT,
		results_url TEXT,
		created_at TEXT NOT NULL
	);

	CREATE TABLE IF NOT EXISTS reviews (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		gpu_id INTEGER NOT NULL,
		rating INTEGER NOT NULL,
		comment TEXT,
		created_at TEXT NOT NULL
	);

	CREATE TABLE IF NOT EXISTS transactions (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL,
		job_id INTEGER NOT NULL,
		amount REAL NOT NULL,
		type TEXT NOT NULL,
		status TEXT NOT NULL DEFAULT 'pending',
		created_at TEXT NOT NULL
	);

	CREATE INDEX IF NOT EXISTS idx_gpus_provider_id ON gpus (provider_id);
	CREATE INDEX IF NOT EXISTS idx_jobs_client_id ON jobs (client_id);
	CREATE INDEX IF NOT EXISTS idx_jobs_gpu_id ON jobs (gpu_id);
	CREATE INDEX IF NOT EXISTS idx_reviews_gpu_id ON reviews (gpu_id);
	CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON transactions (user_id);
	";

const USER_COLUMNS: &str = "id, username, password_hash, email, role, created_at";
const GPU_COLUMNS: &str =
	"id, provider_id, name, vram, cores, tensor_score, price_per_hour, is_online, description, specifications, image_url, created_at";
const JOB_COLUMNS: &str =
	"id, client_id, gpu_id, status, start_time, end_time, total_cost, job_config, results_url, created_at";
const REVIEW_COLUMNS: &str = "id, user_id, gpu_id, rating, comment, created_at";
const TRANSACTION_COLUMNS: &str = "id, user_id, job_id, amount, type, status, created_at";

pub struct SqliteStorage {
	conn: AsyncConnection,
}

impl SqliteStorage {
	/// Open (or create) the database file and make sure the schema exists.
	pub async fn open(path: &Path) -> Result<Self> {
		// Create data directory if it doesn't exist
		if let Some(dir) = path.parent() {
			if !dir.as_os_str().is_empty() && !dir.exists() {
				std::fs::create_dir_all(dir)?;
			}
		}

		let conn = AsyncConnection::open(path.to_path_buf()).await?;
		let storage = Self { conn };
		storage.init().await?;
		info!(path = %path.display(), "sqlite storage opened");
		Ok(storage)
	}

	/// Private in-memory database, gone when the value is dropped.
	pub async fn open_in_memory() -> Result<Self> {
		let conn = AsyncConnection::open_in_memory().await?;
		let storage = Self { conn };
		storage.init().await?;
		debug!("in-memory sqlite storage opened");
		Ok(storage)
	}

	async fn init(&self) -> Result<()> {
		self.conn.call(|conn| {
			let mode: String = conn.pragma_update_and_check(
				None,
				"journal_mode",
				"WAL",
				|row| row.get(0)
			)?;
			debug!(%mode, "journal mode set");
			conn.busy_timeout(Duration::from_secs(5))?;
			conn.pragma_update(None, "synchronous", "NORMAL")?;
			conn.pragma_update(None, "foreign_keys", "OFF")?;
			register_functions(conn)?;

			conn.execute_batch(SCHEMA)?;
			Ok(())
		}).await?;

		Ok(())
	}
}

// Map an engine failure to the storage taxonomy. Unique violations on the
// users table become conflicts carrying the message the API reports.
fn storage_err(e: tokio_rusqlite::Error) -> StorageError {
	match e {
		tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, message)) if
			failure.code == ErrorCode::ConstraintViolation
		=> {
			let message = message.unwrap_or_default();
			if message.contains("users.username") {
				StorageError::duplicate_username()
			} else if message.contains("users.email") {
				StorageError::duplicate_email()
			} else {
				StorageError::Conflict(message)
			}
		}
		tokio_rusqlite::Error::Rusqlite(
			e @ (rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..)),
		) => StorageError::Corrupt(e.to_string()),
		other => StorageError::Backend(other.to_string()),
	}
}

fn text_enum<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
	let raw: String = row.get(idx)?;
	parse(&raw).ok_or_else(|| {
		rusqlite::Error::FromSqlConversionFailure(
			idx,
			Type::Text,
			format!("unexpected value {raw:?}").into()
		)
	})
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
	Ok(User {
		id: row.get(0)?,
		username: row.get(1)?,
		password_hash: row.get(2)?,
		email: row.get(3)?,
		role: text_enum(row, 4, Role::parse)?,
		created_at: row.get(5)?,
	})
}

fn gpu_from_row(row: &Row) -> rusqlite::Result<Gpu> {
	Ok(Gpu {
		id: row.get(0)?,
		provider_id: row.get(1)?,
		name: row.get(2)?,
		vram: row.get(3)?,
		cores: row.get(4)?,
		tensor_score: row.get(5)?,
		price_per_hour: row.get(6)?,
		is_online: row.get(7)?,
		description: row.get(8)?,
		specifications: row.get(9)?,
		image_url: row.get(10)?,
		created_at: row.get(11)?,
	})
}

fn job_from_row(row: &Row) -> rusqlite::Result<Job> {
	Ok(Job {
		id: row.get(0)?,
		client_id: row.get(1)?,
		gpu_id: row.get(2)?,
		status: text_enum(row, 3, JobStatus::parse)?,
		start_time: row.get(4)?,
		end_time: row.get(5)?,
		total_cost: row.get(6)?,
		job_config: row.get(7)?,
		results_url: row.get(8)?,
		created_at: row.get(9)?,
	})
}

fn review_from_row(row: &Row) -> rusqlite::Result<Review> {
	Ok(Review {
		id: row.get(0)?,
		user_id: row.get(1)?,
		gpu_id: row.get(2)?,
		rating: row.get(3)?,
		comment: row.get(4)?,
		created_at: row.get(5)?,
	})
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
	Ok(Transaction {
		id: row.get(0)?,
		user_id: row.get(1)?,
		job_id: row.get(2)?,
		amount: row.get(3)?,
		kind: text_enum(row, 4, TransactionType::parse)?,
		status: text_enum(row, 5, TransactionStatus::parse)?,
		created_at: row.get(6)?,
	})
}

// SQLite's own `lower()` and `LIKE` fold ASCII only.
const UNICODE_LOWER: &str = "unicode_lower";

fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
	conn.create_scalar_function(
		UNICODE_LOWER,
		1,
		FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
		|ctx| {
			let text: Option<String> = ctx.get(0)?;
			Ok(text.map(|t| t.to_lowercase()))
		}
	)
}

/// Compile a filter into a `WHERE` clause (empty when unfiltered) and its
/// positional parameters.
fn gpu_where(filter: &GpuFilter) -> (String, Vec<rusqlite::types::Value>) {
	use rusqlite::types::Value;

	let mut clauses: Vec<String> = Vec::new();
	let mut values: Vec<Value> = Vec::new();

	if let Some(online) = filter.is_online {
		values.push(Value::Integer(online as i64));
		clauses.push(format!("is_online = ?{}", values.len()));
	}
	if let Some(name) = &filter.name {
		values.push(Value::Text(name.to_lowercase()));
		clauses.push(format!("instr({UNICODE_LOWER}(name), ?{}) > 0", values.len()));
	}
	if let Some(min_vram) = filter.min_vram {
		values.push(Value::Integer(min_vram as i64));
		clauses.push(format!("vram >= ?{}", values.len()));
	}
	if let Some(max_price) = filter.max_price {
		values.push(Value::Real(max_price));
		clauses.push(format!("price_per_hour <= ?{}", values.len()));
	}
	if let Some(provider_id) = filter.provider_id {
		values.push(Value::Integer(provider_id));
		clauses.push(format!("provider_id = ?{}", values.len()));
	}

	if clauses.is_empty() {
		(String::new(), values)
	} else {
		(format!(" WHERE {}", clauses.join(" AND ")), values)
	}
}

impl SqliteStorage {
	async fn fetch_one<T, F>(&self, sql: String, id: i64, map: F) -> StorageResult<Option<T>>
		where T: Send + 'static, F: FnOnce(&Row) -> rusqlite::Result<T> + Send + 'static
	{
		self.conn
			.call(move |conn| { Ok(conn.query_row(&sql, [id], map).optional()?) }).await
			.map_err(storage_err)
	}

	async fn fetch_many<T, F>(&self, sql: String, key: i64, map: F) -> StorageResult<Vec<T>>
		where T: Send + 'static, F: FnMut(&Row) -> rusqlite::Result<T> + Send + 'static
	{
		self.conn
			.call(move |conn| {
				let mut stmt = conn.prepare(&sql)?;
				let rows = stmt.query_map([key], map)?.collect::<Result<Vec<_>, _>>()?;
				Ok(rows)
			}).await
			.map_err(storage_err)
	}

	async fn fetch_user_by(&self, column: &'static str, value: String) -> StorageResult<Option<User>> {
		// Column collation is NOCASE, so equality ignores ASCII case
		let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
		self.conn
			.call(move |conn| { Ok(conn.query_row(&sql, [value], user_from_row).optional()?) }).await
			.map_err(storage_err)
	}
}

#[async_trait]
impl MarketStorage for SqliteStorage {
	fn backend_name(&self) -> &'static str {
		"sqlite"
	}

	async fn get_user(&self, id: i64) -> StorageResult<Option<User>> {
		self.fetch_one(format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), id, user_from_row).await
	}

	async fn get_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
		self.fetch_user_by("username", username.to_string()).await
	}

	async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
		self.fetch_user_by("email", email.to_string()).await
	}

	async fn create_user(&self, user: NewUser) -> StorageResult<User> {
		// The UNIQUE indexes decide; there is no separate existence check.
		self.conn
			.call(move |conn| {
				conn.execute(
					"INSERT INTO users (username, password_hash, email, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
					params![user.username, user.password_hash, user.email, user.role.as_str(), Utc::now()]
				)?;
				let id = conn.last_insert_rowid();
				Ok(
					conn.query_row(
						&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
						[id],
						user_from_row
					)?
				)
			}).await
			.map_err(storage_err)
	}

	async fn get_gpu(&self, id: i64) -> StorageResult<Option<Gpu>> {
		self.fetch_one(format!("SELECT {GPU_COLUMNS} FROM gpus WHERE id = ?1"), id, gpu_from_row).await
	}

	async fn get_gpus(&self, filter: &GpuFilter) -> StorageResult<Vec<Gpu>> {
		let (where_clause, values) = gpu_where(filter);
		let sql = format!("SELECT {GPU_COLUMNS} FROM gpus{where_clause} ORDER BY id");

		self.conn
			.call(move |conn| {
				let mut stmt = conn.prepare(&sql)?;
				let gpus = stmt
					.query_map(params_from_iter(values.iter()), gpu_from_row)?
					.collect::<Result<Vec<_>, _>>()?;
				Ok(gpus)
			}).await
			.map_err(storage_err)
	}

	async fn get_gpus_by_provider_id(&self, provider_id: i64) -> StorageResult<Vec<Gpu>> {
		self.fetch_many(
			format!("SELECT {GPU_COLUMNS} FROM gpus WHERE provider_id = ?1 ORDER BY id"),
			provider_id,
			gpu_from_row
		).await
	}

	async fn create_gpu(&self, gpu: NewGpu) -> StorageResult<Gpu> {
		self.conn
			.call(move |conn| {
				conn.execute(
					"INSERT INTO gpus (provider_id, name, vram, cores, tensor_score, price_per_hour, is_online, description, specifications, image_url, created_at)
					VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
					params![
						gpu.provider_id,
						gpu.name,
						gpu.vram,
						gpu.cores,
						gpu.tensor_score,
						gpu.price_per_hour,
						gpu.is_online,
						gpu.description,
						gpu.specifications,
						gpu.image_url,
						Utc::now()
					]
				)?;
				let id = conn.last_insert_rowid();
				Ok(
					conn.query_row(
						&format!("SELECT {GPU_COLUMNS} FROM gpus WHERE id = ?1"),
						[id],
						gpu_from_row
					)?
				)
			}).await
			.map_err(storage_err)
	}

	async fn update_gpu(&self, id: i64, patch: GpuPatch) -> StorageResult<Option<Gpu>> {
		self.conn
			.call(move |conn| {
				let tx = conn.transaction()?;
				let current = tx
					.query_row(
						&format!("SELECT {GPU_COLUMNS} FROM gpus WHERE id = ?1"),
						[id],
						gpu_from_row
					)
					.optional()?;
				let Some(mut gpu) = current else {
					return Ok(None);
				};

				gpu.apply(patch);
				tx.execute(
					"UPDATE gpus SET provider_id = ?1, name = ?2, vram = ?3, cores = ?4, tensor_score = ?5,
						price_per_hour = ?6, is_online = ?7, description = ?8, specifications = ?9, image_url = ?10
					WHERE id = ?11",
					params![
						gpu.provider_id,
						gpu.name,
						gpu.vram,
						gpu.cores,
						gpu.tensor_score,
						gpu.price_per_hour,
						gpu.is_online,
						gpu.description,
						gpu.specifications,
						gpu.image_url,
						id
					]
				)?;
				tx.commit()?;
				Ok(Some(gpu))
			}).await
			.map_err(storage_err)
	}

	async fn delete_gpu(&self, id: i64) -> StorageResult<bool> {
		self.conn
			.call(move |conn| { Ok(conn.execute("DELETE FROM gpus WHERE id = ?1", [id])? > 0) }).await
			.map_err(storage_err)
	}

	async fn get_job(&self, id: i64) -> StorageResult<Option<Job>> {
		self.fetch_one(format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"), id, job_from_row).await
	}

	async fn get_jobs_by_client_id(&self, client_id: i64) -> StorageResult<Vec<Job>> {
		self.fetch_many(
			format!("SELECT {JOB_COLUMNS} FROM jobs WHERE client_id = ?1 ORDER BY id"),
			client_id,
			job_from_row
		).await
	}

	async fn get_jobs_by_gpu_id(&self, gpu_id: i64) -> StorageResult<Vec<Job>> {
		self.fetch_many(
			format!("SELECT {JOB_COLUMNS} FROM jobs WHERE gpu_id = ?1 ORDER BY id"),
			gpu_id,
			job_from_row
		).await
	}

	async fn create_job(&self, job: NewJob) -> StorageResult<Job> {
		self.conn
			.call(move |conn| {
				conn.execute(
					"INSERT INTO jobs (client_id, gpu_id, status, job_config, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
					params![job.client_id, job.gpu_id, job.status.as_str(), job.job_config, Utc::now()]
				)?;
				let id = conn.last_insert_rowid();
				Ok(
					conn.query_row(
						&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
						[id],
						job_from_row
					)?
				)
			}).await
			.map_err(storage_err)
	}

	async fn update_job(&self, id: i64, patch: JobPatch) -> StorageResult<Option<Job>> {
		self.conn
			.call(move |conn| {
				let tx = conn.transaction()?;
				let current = tx
					.query_row(
						&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
						[id],
						job_from_row
					)
					.optional()?;
				let Some(mut job) = current else {
					return Ok(None);
				};

				job.apply(patch);
				tx.execute(
					"UPDATE jobs SET client_id = ?1, gpu_id = ?2, status = ?3, start_time = ?4, end_time = ?5,
						total_cost = ?6, job_config = ?7, results_url = ?8
					WHERE id = ?9",
					params![
						job.client_id,
						job.gpu_id,
						job.status.as_str(),
						job.start_time,
						job.end_time,
						job.total_cost,
						job.job_config,
						job.results_url,
						id
					]
				)?;
				tx.commit()?;
				Ok(Some(job))
			}).await
			.map_err(storage_err)
	}

	async fn get_review(&self, id: i64) -> StorageResult<Option<Review>> {
		self.fetch_one(format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"), id, review_from_row).await
	}

	async fn get_reviews_by_gpu_id(&self, gpu_id: i64) -> StorageResult<Vec<Review>> {
		self.fetch_many(
			format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE gpu_id = ?1 ORDER BY id"),
			gpu_id,
			review_from_row
		).await
	}

	async fn create_review(&self, review: NewReview) -> StorageResult<Review> {
		self.conn
			.call(move |conn| {
				conn.execute(
					"INSERT INTO reviews (user_id, gpu_id, rating, comment, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
					params![review.user_id, review.gpu_id, review.rating, review.comment, Utc::now()]
				)?;
				let id = conn.last_insert_rowid();
				Ok(
					conn.query_row(
						&format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"),
						[id],
						review_from_row
					)?
				)
			}).await
			.map_err(storage_err)
	}

	async fn get_transaction(&self, id: i64) -> StorageResult<Option<Transaction>> {
		self.fetch_one(
			format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
			id,
			transaction_from_row
		).await
	}

	async fn get_transactions_by_user_id(&self, user_id: i64) -> StorageResult<Vec<Transaction>> {
		self.fetch_many(
			format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = ?1 ORDER BY id"),
			user_id,
			transaction_from_row
		).await
	}

	async fn create_transaction(&self, transaction: NewTransaction) -> StorageResult<Transaction> {
		self.conn
			.call(move |conn| {
				conn.execute(
					"INSERT INTO transactions (user_id, job_id, amount, type, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
					params![
						transaction.user_id,
						transaction.job_id,
						transaction.amount,
						transaction.kind.as_str(),
						transaction.status.as_str(),
						Utc::now()
					]
				)?;
				let id = conn.last_insert_rowid();
				Ok(
					conn.query_row(
						&format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
						[id],
						transaction_from_row
					)?
				)
			}).await
			.map_err(storage_err)
	}

	async fn update_transaction(
		&self,
		id: i64,
		patch: TransactionPatch
	) -> StorageResult<Option<Transaction>> {
		self.conn
			.call(move |conn| {
				let tx = conn.transaction()?;
				let current = tx
					.query_row(
						&format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
						[id],
						transaction_from_row
					)
					.optional()?;
				let Some(mut transaction) = current else {
					return Ok(None);
				};

				transaction.apply(patch);
				tx.execute(
					"UPDATE transactions SET user_id = ?1, job_id = ?2, amount = ?3, type = ?4, status = ?5 WHERE id = ?6",
					params![
						transaction.user_id,
						transaction.job_id,
						transaction.amount,
						transaction.kind.as_str(),
						transaction.status.as_str(),
						id
					]
				)?;
				tx.commit()?;
				Ok(Some(transaction))
			}).await
			.map_err(storage_err)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use common::seed::seed_demo_data;
	use serde_json::json;
	use std::sync::Arc;

	fn new_user(username: &str, email: &str) -> NewUser {
		NewUser {
			username: username.to_string(),
			password_hash: "$argon2id$v=19$stub".to_string(),
			email: email.to_string(),
			role: Role::Client,
		}
	}

	fn new_gpu(name: &str, vram: i32, price: f64, online: bool, provider_id: i64) -> NewGpu {
		NewGpu {
			provider_id,
			name: name.to_string(),
			vram,
			cores: 4096,
			tensor_score: 80.0,
			price_per_hour: price,
			is_online: online,
			description: None,
			specifications: None,
			image_url: None,
		}
	}

	#[tokio::test]
	async fn user_uniqueness_is_enforced_by_the_schema() {
		let store = SqliteStorage::open_in_memory().await.unwrap();
		let alice = store.create_user(new_user("Alice", "alice@example.com")).await.unwrap();
		assert_eq!(alice.id, 1);
		assert_eq!(alice.role, Role::Client);

		let dup_name = store.create_user(new_user("ALICE", "other@example.com")).await;
		assert!(
			matches!(dup_name, Err(StorageError::Conflict(msg)) if msg == "Username already exists")
		);

		let dup_email = store.create_user(new_user("bob", "Alice@Example.com")).await;
		assert!(matches!(dup_email, Err(StorageError::Conflict(msg)) if msg == "Email already exists"));

		let found = store.get_user_by_username("alice").await.unwrap().unwrap();
		assert_eq!(found, alice);
		assert!(store.get_user_by_email("ALICE@EXAMPLE.COM").await.unwrap().is_some());
		assert!(store.get_user(99).await.unwrap().is_none());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_registrations_admit_one() {
		let store = Arc::new(SqliteStorage::open_in_memory().await.unwrap());
		let handles: Vec<_> = (0..6)
			.map(|i| {
				let store = store.clone();
				tokio::spawn(async move {
					store.create_user(new_user("racer", &format!("racer{i}@example.com"))).await
				})
			})
			.collect();

		let mut successes = 0;
		let mut conflicts = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => successes += 1,
				Err(StorageError::Conflict(_)) => conflicts += 1,
				Err(other) => panic!("unexpected error: {other}"),
			}
		}
		assert_eq!((successes, conflicts), (1, 5));
	}

	#[tokio::test]
	async fn gpu_round_trip_keeps_every_field() {
		let store = SqliteStorage::open_in_memory().await.unwrap();
		let mut input = new_gpu("NVIDIA H100", 80, 4.5, true, 3);
		input.description = Some("Hopper".to_string());
		input.specifications = Some(json!({ "architecture": "Hopper", "nvlink": true }));
		input.image_url = Some("https://example.com/h100.png".to_string());

		let created = store.create_gpu(input.clone()).await.unwrap();
		let fetched = store.get_gpu(created.id).await.unwrap().unwrap();

		assert_eq!(fetched, created);
		assert_eq!(fetched.name, input.name);
		assert_eq!(fetched.specifications, input.specifications);
		assert_eq!(fetched.description, input.description);
		assert_eq!(fetched.image_url, input.image_url);
		assert!(fetched.is_online);
	}

	#[tokio::test]
	async fn gpu_filters_match_the_in_memory_predicate() {
		let store = SqliteStorage::open_in_memory().await.unwrap();
		let rows = [
			new_gpu("NVIDIA RTX 4090", 24, 1.82, true, 1),
			new_gpu("NVIDIA A100", 80, 3.74, true, 2),
			new_gpu("NVIDIA RTX 3080 Ti", 12, 0.95, false, 3),
			new_gpu("AMD Radeon RX 7900 XTX", 24, 1.25, true, 1),
			new_gpu("Discount_50% Card", 8, 0.2, true, 4),
			new_gpu("ÜBER Karte Ω", 16, 0.6, true, 4),
		];
		for gpu in rows {
			store.create_gpu(gpu).await.unwrap();
		}
		let all = store.get_gpus(&GpuFilter::default()).await.unwrap();
		assert_eq!(all.len(), 6);

		let filters = [
			GpuFilter { name: Some("über".to_string()), ..Default::default() },
			GpuFilter { name: Some("KARTE ω".to_string()), ..Default::default() },
			GpuFilter { is_online: Some(false), ..Default::default() },
			GpuFilter { name: Some("rtx".to_string()), ..Default::default() },
			GpuFilter { name: Some("50%".to_string()), ..Default::default() },
			GpuFilter { name: Some("t_5".to_string()), ..Default::default() },
			GpuFilter { min_vram: Some(24), max_price: Some(2.0), ..Default::default() },
			GpuFilter { provider_id: Some(1), is_online: Some(true), ..Default::default() },
			GpuFilter { max_price: Some(0.0), ..Default::default() },
		];
		for filter in filters {
			let expected: Vec<i64> = all
				.iter()
				.filter(|g| filter.matches(g))
				.map(|g| g.id)
				.collect();
			let actual: Vec<i64> = store
				.get_gpus(&filter).await
				.unwrap()
				.iter()
				.map(|g| g.id)
				.collect();
			assert_eq!(actual, expected, "{filter:?}");
		}

		let folded = store
			.get_gpus(&(GpuFilter { name: Some("über karte".to_string()), ..Default::default() })).await
			.unwrap();
		assert_eq!(folded.len(), 1);
		assert_eq!(folded[0].name, "ÜBER Karte Ω");

		let by_provider = store.get_gpus_by_provider_id(1).await.unwrap();
		assert_eq!(by_provider.len(), 2);
	}

	#[tokio::test]
	async fn gpu_update_and_delete() {
		let store = SqliteStorage::open_in_memory().await.unwrap();
		let gpu = store.create_gpu(new_gpu("A6000", 48, 2.75, true, 2)).await.unwrap();

		let updated = store
			.update_gpu(gpu.id, GpuPatch {
				is_online: Some(false),
				description: Some("maintenance".to_string()),
				..Default::default()
			}).await
			.unwrap()
			.unwrap();
		assert!(!updated.is_online);
		assert_eq!(updated.description.as_deref(), Some("maintenance"));
		assert_eq!(updated.created_at, gpu.created_at);
		assert_eq!(store.get_gpu(gpu.id).await.unwrap().unwrap(), updated);

		assert!(store.update_gpu(404, GpuPatch::default()).await.unwrap().is_none());
		assert!(store.delete_gpu(gpu.id).await.unwrap());
		assert!(!store.delete_gpu(gpu.id).await.unwrap());
	}

	#[tokio::test]
	async fn job_lifecycle_fields() {
		let store = SqliteStorage::open_in_memory().await.unwrap();
		let job = store
			.create_job(NewJob {
				client_id: 7,
				gpu_id: 1,
				status: JobStatus::Pending,
				job_config: Some(json!({ "runtime": "tensorflow" })),
			}).await
			.unwrap();
		assert!(job.start_time.is_none());
		assert_eq!(job.job_config, Some(json!({ "runtime": "tensorflow" })));

		let started = Utc::now();
		let running = store
			.update_job(job.id, JobPatch {
				status: Some(JobStatus::Running),
				start_time: Some(started),
				..Default::default()
			}).await
			.unwrap()
			.unwrap();
		assert_eq!(running.status, JobStatus::Running);

		let reread = store.get_job(job.id).await.unwrap().unwrap();
		assert_eq!(reread.start_time, Some(started));
		assert_eq!(reread.status, JobStatus::Running);

		assert_eq!(store.get_jobs_by_client_id(7).await.unwrap().len(), 1);
		assert_eq!(store.get_jobs_by_gpu_id(1).await.unwrap().len(), 1);
		assert!(store.get_jobs_by_gpu_id(2).await.unwrap().is_empty());
		assert!(store.update_job(99, JobPatch::default()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn reviews_and_transactions() {
		let store = SqliteStorage::open_in_memory().await.unwrap();
		let review = store
			.create_review(NewReview { user_id: 1, gpu_id: 2, rating: 9, comment: None }).await
			.unwrap();
		assert_eq!(review.rating, 9);
		assert_eq!(store.get_review(review.id).await.unwrap(), Some(review));
		assert_eq!(store.get_reviews_by_gpu_id(2).await.unwrap().len(), 1);

		let tx = store
			.create_transaction(NewTransaction {
				user_id: 1,
				job_id: 3,
				amount: 42.0,
				kind: TransactionType::Deposit,
				status: TransactionStatus::Pending,
			}).await
			.unwrap();
		let failed = store
			.update_transaction(tx.id, TransactionPatch {
				status: Some(TransactionStatus::Failed),
				..Default::default()
			}).await
			.unwrap()
			.unwrap();
		assert_eq!(failed.status, TransactionStatus::Failed);
		assert_eq!(failed.kind, TransactionType::Deposit);
		assert_eq!(store.get_transaction(tx.id).await.unwrap(), Some(failed));
		assert_eq!(store.get_transactions_by_user_id(1).await.unwrap().len(), 1);
		assert!(store.update_transaction(5, TransactionPatch::default()).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn data_survives_reopen_and_seed_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested").join("market.db");

		{
			let store = SqliteStorage::open(&path).await.unwrap();
			seed_demo_data(&store).await.unwrap();
		}

		let store = SqliteStorage::open(&path).await.unwrap();
		seed_demo_data(&store).await.unwrap();

		let gpus = store.get_gpus(&GpuFilter::default()).await.unwrap();
		assert_eq!(gpus.len(), 5);
		assert!(store.get_user_by_username("deep_learner42").await.unwrap().is_some());
	}
}
