use anyhow::Result;
use tracing::info;

use common::{ config::Config, memory::MemStorage, server::{ init_tracing, run_server } };

#[tokio::main]
async fn main() -> Result<()> {
	let config = Config::load(3000)?;
	init_tracing(config.log_json);

	// State lives only as long as the process
	info!("Starting in-memory marketplace backend");
	run_server(MemStorage::new(), &config).await?;

	Ok(())
}
