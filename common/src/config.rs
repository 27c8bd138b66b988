use std::{ env, fmt::Display, net::IpAddr, path::PathBuf, str::FromStr };

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid value for {key}: {message}")]
	Invalid {
		key: &'static str,
		message: String,
	},
}

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
	pub bind_addr: IpAddr,
	pub port: u16,
	pub database_path: PathBuf,
	pub seed_demo_data: bool,
	pub log_json: bool,
}

impl Config {
	/// Load settings. `default_port` differs per backend binary.
	pub fn load(default_port: u16) -> Result<Self, ConfigError> {
		// A missing .env file is fine
		let _ = dotenvy::dotenv();

		Ok(Self {
			bind_addr: try_load("BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?,
			port: try_load("PORT", default_port)?,
			database_path: try_load("DATABASE_PATH", PathBuf::from("./data/market.db"))?,
			seed_demo_data: try_load("SEED_DEMO_DATA", true)?,
			log_json: try_load("LOG_JSON", false)?,
		})
	}
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
	where T: FromStr, T::Err: Display
{
	match env::var(key) {
		Ok(raw) =>
			raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
				key,
				message: e.to_string(),
			}),
		Err(_) => Ok(default),
	}
}
