//! Demo catalog loaded at startup when `SEED_DEMO_DATA` is on.

use anyhow::{ anyhow, Result };
use serde_json::json;
use tracing::info;

use crate::{
	models::{ NewGpu, NewUser, Role },
	password::hash_password,
	storage::MarketStorage,
};

const DEMO_PROVIDERS: [(&str, &str, &str); 3] = [
	("crypto_miner92", "provider1@example.com", "demo-password-1"),
	("ai_research_lab", "provider2@example.com", "demo-password-2"),
	("deep_learner42", "provider3@example.com", "demo-password-3"),
];

/// Insert whichever demo providers and GPUs are missing. Rows already present
/// are left alone, so a restart (or a seed interrupted halfway) converges on
/// the full catalog without duplicates.
pub async fn seed_demo_data<S: MarketStorage + ?Sized>(storage: &S) -> Result<()> {
	let mut provider_ids = Vec::with_capacity(DEMO_PROVIDERS.len());
	let mut new_providers = 0;
	for (username, email, password) in DEMO_PROVIDERS {
		if let Some(user) = storage.get_user_by_username(username).await? {
			provider_ids.push(user.id);
			continue;
		}

		let password_hash = hash_password(password).map_err(|e| anyhow!("hashing demo password: {e}"))?;
		let user = storage.create_user(NewUser {
			username: username.to_string(),
			password_hash,
			email: email.to_string(),
			role: Role::Provider,
		}).await?;
		provider_ids.push(user.id);
		new_providers += 1;
	}

	let mut new_gpus = 0;
	for gpu in demo_gpus(provider_ids[0], provider_ids[1], provider_ids[2]) {
		let listed = storage.get_gpus_by_provider_id(gpu.provider_id).await?;
		if listed.iter().any(|existing| existing.name == gpu.name) {
			continue;
		}
		storage.create_gpu(gpu).await?;
		new_gpus += 1;
	}

	if new_providers == 0 && new_gpus == 0 {
		info!("demo data already present, skipping seed");
	} else {
		info!(providers = new_providers, gpus = new_gpus, "seeded demo catalog");
	}
	Ok(())
}

fn demo_gpus(miner: i64, lab: i64, learner: i64) -> Vec<NewGpu> {
	vec![
		NewGpu {
			provider_id: miner,
			name: "NVIDIA RTX 4090".to_string(),
			vram: 24,
			cores: 16384,
			tensor_score: 98.2,
			price_per_hour: 1.82,
			is_online: true,
			description: Some("Top-tier gaming and AI GPU with DLSS 3.0 support".to_string()),
			specifications: Some(
				json!({ "architecture": "Ada Lovelace", "boost_clock": "2.52 GHz", "memory_type": "GDDR6X" })
			),
			image_url: Some(
				"https://images.unsplash.com/photo-1587202372775-e229f172b9d7?ixlib=rb-1.2.1&auto=format&fit=crop&w=500&q=80".to_string()
			),
		},
		NewGpu {
			provider_id: lab,
			name: "NVIDIA A100".to_string(),
			vram: 80,
			cores: 6912,
			tensor_score: 99.7,
			price_per_hour: 3.74,
			is_online: true,
			description: Some("Data center GPU built for AI and HPC workloads".to_string()),
			specifications: Some(
				json!({ "architecture": "Ampere", "boost_clock": "1.41 GHz", "memory_type": "HBM2e" })
			),
			image_url: Some(
				"https://images.unsplash.com/photo-1647598382205-01d0a7ca05a8?ixlib=rb-1.2.1&auto=format&fit=crop&w=500&q=80".to_string()
			),
		},
		NewGpu {
			provider_id: learner,
			name: "NVIDIA RTX 3080 Ti".to_string(),
			vram: 12,
			cores: 10240,
			tensor_score: 89.3,
			price_per_hour: 0.95,
			is_online: false,
			description: Some("Excellent performance for deep learning and gaming".to_string()),
			specifications: Some(
				json!({ "architecture": "Ampere", "boost_clock": "1.67 GHz", "memory_type": "GDDR6X" })
			),
			image_url: Some(
				"https://images.unsplash.com/photo-1628335903423-61e8886bd8e1?ixlib=rb-1.2.1&auto=format&fit=crop&w=500&q=80".to_string()
			),
		},
		NewGpu {
			provider_id: miner,
			name: "AMD Radeon RX 7900 XTX".to_string(),
			vram: 24,
			cores: 12288,
			tensor_score: 87.5,
			price_per_hour: 1.25,
			is_online: true,
			description: Some("High-end GPU for graphics and compute tasks".to_string()),
			specifications: Some(
				json!({ "architecture": "RDNA 3", "boost_clock": "2.5 GHz", "memory_type": "GDDR6" })
			),
			image_url: Some(
				"https://images.unsplash.com/photo-1591405351990-4726e331f141?ixlib=rb-1.2.1&auto=format&fit=crop&w=800&q=80".to_string()
			),
		},
		NewGpu {
			provider_id: lab,
			name: "NVIDIA RTX A6000".to_string(),
			vram: 48,
			cores: 10752,
			tensor_score: 95.8,
			price_per_hour: 2.75,
			is_online: true,
			description: Some("Professional visualization and compute GPU".to_string()),
			specifications: Some(
				json!({ "architecture": "Ampere", "boost_clock": "1.8 GHz", "memory_type": "GDDR6" })
			),
			image_url: Some(
				"https://images.unsplash.com/photo-1591488320409-993e1917e860?ixlib=rb-1.2.1&auto=format&fit=crop&w=500&q=80".to_string()
			),
		}
	]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ memory::MemStorage, models::GpuFilter };

	#[tokio::test]
	async fn seeds_once() {
		let store = MemStorage::new();
		seed_demo_data(&store).await.unwrap();
		seed_demo_data(&store).await.unwrap();

		let gpus = store.get_gpus(&GpuFilter::default()).await.unwrap();
		assert_eq!(gpus.len(), 5);

		let lab = store.get_user_by_username("ai_research_lab").await.unwrap().unwrap();
		assert_eq!(lab.role, Role::Provider);
		let lab_gpus = store.get_gpus_by_provider_id(lab.id).await.unwrap();
		let names: Vec<_> = lab_gpus.iter().map(|g| g.name.as_str()).collect();
		assert_eq!(names, vec!["NVIDIA A100", "NVIDIA RTX A6000"]);

		let online = store
			.get_gpus(&(GpuFilter { is_online: Some(true), ..Default::default() })).await
			.unwrap();
		assert_eq!(online.len(), 4);
	}

	#[tokio::test]
	async fn interrupted_seed_is_completed() {
		let store = MemStorage::new();
		// Only the first provider made it in before the previous run stopped
		store
			.create_user(NewUser {
				username: "crypto_miner92".to_string(),
				password_hash: hash_password("demo-password-1").unwrap(),
				email: "provider1@example.com".to_string(),
				role: Role::Provider,
			}).await
			.unwrap();

		seed_demo_data(&store).await.unwrap();
		assert_eq!(store.get_gpus(&GpuFilter::default()).await.unwrap().len(), 5);
		assert!(store.get_user_by_username("deep_learner42").await.unwrap().is_some());

		let a100 = store
			.get_gpus(&(GpuFilter { name: Some("A100".to_string()), ..Default::default() })).await
			.unwrap();
		assert!(store.delete_gpu(a100[0].id).await.unwrap());

		seed_demo_data(&store).await.unwrap();
		let names: Vec<_> = store
			.get_gpus(&GpuFilter::default()).await
			.unwrap()
			.into_iter()
			.map(|g| g.name)
			.collect();
		assert_eq!(names.len(), 5);
		assert_eq!(names.iter().filter(|n| n.as_str() == "NVIDIA A100").count(), 1);
	}
}
