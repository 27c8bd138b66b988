use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	#[default]
	Client,
	Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	#[default]
	Pending,
	Running,
	Completed,
	Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
	Deposit,
	Payment,
	Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
	#[default]
	Pending,
	Completed,
	Failed,
}

macro_rules! text_enum {
	($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
		impl $ty {
			pub fn as_str(&self) -> &'static str {
				match self {
					$(Self::$variant => $text,)+
				}
			}

			pub fn parse(value: &str) -> Option<Self> {
				match value {
					$($text => Some(Self::$variant),)+
					_ => None,
				}
			}
		}
	};
}

text_enum!(Role { Client => "client", Provider => "provider" });
text_enum!(JobStatus {
	Pending => "pending",
	Running => "running",
	Completed => "completed",
	Failed => "failed",
});
text_enum!(TransactionType {
	Deposit => "deposit",
	Payment => "payment",
	Withdrawal => "withdrawal",
});
text_enum!(TransactionStatus {
	Pending => "pending",
	Completed => "completed",
	Failed => "failed",
});

/// A registered account. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	pub id: i64,
	pub username: String,
	#[serde(skip)]
	pub password_hash: String,
	pub email: String,
	pub role: Role,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gpu {
	pub id: i64,
	pub provider_id: i64,
	pub name: String,
	pub vram: i32,
	pub cores: i32,
	pub tensor_score: f64,
	pub price_per_hour: f64,
	pub is_online: bool,
	pub description: Option<String>,
	pub specifications: Option<Value>,
	pub image_url: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
	pub id: i64,
	pub client_id: i64,
	pub gpu_id: i64,
	pub status: JobStatus,
	pub start_time: Option<DateTime<Utc>>,
	pub end_time: Option<DateTime<Utc>>,
	pub total_cost: Option<f64>,
	pub job_config: Option<Value>,
	pub results_url: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
	pub id: i64,
	pub user_id: i64,
	pub gpu_id: i64,
	pub rating: i32,
	pub comment: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
	pub id: i64,
	pub user_id: i64,
	pub job_id: i64,
	pub amount: f64,
	#[serde(rename = "type")]
	pub kind: TransactionType,
	pub status: TransactionStatus,
	pub created_at: DateTime<Utc>,
}

// Insert payloads. The storage layer assigns id and createdAt.

/// Registration body. `password` is plaintext here and only here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterUser {
	pub username: String,
	pub password: String,
	pub email: String,
	#[serde(default)]
	pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
	pub username: String,
	pub password_hash: String,
	pub email: String,
	pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewGpu {
	pub provider_id: i64,
	pub name: String,
	pub vram: i32,
	pub cores: i32,
	pub tensor_score: f64,
	pub price_per_hour: f64,
	#[serde(default)]
	pub is_online: bool,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub specifications: Option<Value>,
	#[serde(default)]
	pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewJob {
	pub client_id: i64,
	pub gpu_id: i64,
	#[serde(default)]
	pub status: JobStatus,
	#[serde(default)]
	pub job_config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewReview {
	pub user_id: i64,
	pub gpu_id: i64,
	pub rating: i32,
	#[serde(default)]
	pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTransaction {
	pub user_id: i64,
	pub job_id: i64,
	pub amount: f64,
	#[serde(rename = "type")]
	pub kind: TransactionType,
	#[serde(default)]
	pub status: TransactionStatus,
}

// Partial updates. A field that is absent (or null) leaves the stored value as is.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GpuPatch {
	pub provider_id: Option<i64>,
	pub name: Option<String>,
	pub vram: Option<i32>,
	pub cores: Option<i32>,
	pub tensor_score: Option<f64>,
	pub price_per_hour: Option<f64>,
	pub is_online: Option<bool>,
	pub description: Option<String>,
	pub specifications: Option<Value>,
	pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobPatch {
	pub client_id: Option<i64>,
	pub gpu_id: Option<i64>,
	pub status: Option<JobStatus>,
	pub start_time: Option<DateTime<Utc>>,
	pub end_time: Option<DateTime<Utc>>,
	pub total_cost: Option<f64>,
	pub job_config: Option<Value>,
	pub results_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionPatch {
	pub user_id: Option<i64>,
	pub job_id: Option<i64>,
	pub amount: Option<f64>,
	#[serde(rename = "type")]
	pub kind: Option<TransactionType>,
	pub status: Option<TransactionStatus>,
}

/// Listing criteria for GPUs. Every present field must match; absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuFilter {
	pub is_online: Option<bool>,
	/// Case-insensitive substring of the GPU name.
	pub name: Option<String>,
	pub min_vram: Option<i32>,
	pub max_price: Option<f64>,
	pub provider_id: Option<i64>,
}

impl GpuFilter {
	pub fn matches(&self, gpu: &Gpu) -> bool {
		if let Some(online) = self.is_online {
			if gpu.is_online != online {
				return false;
			}
		}
		if let Some(name) = &self.name {
			if !gpu.name.to_lowercase().contains(&name.to_lowercase()) {
				return false;
			}
		}
		if let Some(min_vram) = self.min_vram {
			if gpu.vram < min_vram {
				return false;
			}
		}
		if let Some(max_price) = self.max_price {
			if gpu.price_per_hour > max_price {
				return false;
			}
		}
		if let Some(provider_id) = self.provider_id {
			if gpu.provider_id != provider_id {
				return false;
			}
		}
		true
	}
}

impl Gpu {
	pub fn apply(&mut self, patch: GpuPatch) {
		if let Some(v) = patch.provider_id {
			self.provider_id = v;
		}
		if let Some(v) = patch.name {
			self.name = v;
		}
		if let Some(v) = patch.vram {
			self.vram = v;
		}
		if let Some(v) = patch.cores {
			self.cores = v;
		}
		if let Some(v) = patch.tensor_score {
			self.tensor_score = v;
		}
		if let Some(v) = patch.price_per_hour {
			self.price_per_hour = v;
		}
		if let Some(v) = patch.is_online {
			self.is_online = v;
		}
		if patch.description.is_some() {
			self.description = patch.description;
		}
		if patch.specifications.is_some() {
			self.specifications = patch.specifications;
		}
		if patch.image_url.is_some() {
			self.image_url = patch.image_url;
		}
	}
}

impl Job {
	pub fn apply(&mut self, patch: JobPatch) {
		if let Some(v) = patch.client_id {
			self.client_id = v;
		}
		if let Some(v) = patch.gpu_id {
			self.gpu_id = v;
		}
		if let Some(v) = patch.status {
			self.status = v;
		}
		if patch.start_time.is_some() {
			self.start_time = patch.start_time;
		}
		if patch.end_time.is_some() {
			self.end_time = patch.end_time;
		}
		if patch.total_cost.is_some() {
			self.total_cost = patch.total_cost;
		}
		if patch.job_config.is_some() {
			self.job_config = patch.job_config;
		}
		if patch.results_url.is_some() {
			self.results_url = patch.results_url;
		}
	}
}

impl Transaction {
	pub fn apply(&mut self, patch: TransactionPatch) {
		if let Some(v) = patch.user_id {
			self.user_id = v;
		}
		if let Some(v) = patch.job_id {
			self.job_id = v;
		}
		if let Some(v) = patch.amount {
			self.amount = v;
		}
		if let Some(v) = patch.kind {
			self.kind = v;
		}
		if let Some(v) = patch.status {
			self.status = v;
		}
	}
}
