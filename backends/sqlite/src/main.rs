use anyhow::Result;
use tracing::info;

mod sqlite_storage;

use crate::sqlite_storage::SqliteStorage;
use common::{ config::Config, server::{ init_tracing, run_server } };

#[tokio::main]
async fn main() -> Result<()> {
	let config = Config::load(3001)?;
	init_tracing(config.log_json);

	info!(path = %config.database_path.display(), "Starting SQLite marketplace backend");
	let storage = SqliteStorage::open(&config.database_path).await?;

	run_server(storage, &config).await?;

	Ok(())
}
