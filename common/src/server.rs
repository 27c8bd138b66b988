use axum::{
	extract::Request,
	http::{ header::CONTENT_TYPE, Method },
	middleware::{ self, Next },
	response::Response,
	routing::{ get, post, put },
	Json,
	Router,
};
use serde_json::{ json, Value };
use std::{ net::SocketAddr, sync::Arc, time::Duration };
use tokio::{ net::TcpListener, signal };
use anyhow::Result;
use tower_http::cors::{ Any, CorsLayer };
use tracing::{ debug, info, info_span, warn, Instrument };
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt, EnvFilter };
use uuid::Uuid;

use crate::{
	config::Config,
	routes::{ auth, gpus, jobs, reviews, transactions, AppState },
	seed::seed_demo_data,
	storage::MarketStorage,
};

/// Initialise the global tracing subscriber. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing(log_json: bool) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry().with(env_filter);
	if log_json {
		registry.with(tracing_subscriber::fmt::layer().json()).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}

/// Build the full router: the REST API under `/api` plus banner and health.
pub fn build_router<T: MarketStorage + 'static>(storage: Arc<T>) -> Router {
	let state = Arc::new(AppState { storage });

	let api = Router::new()
		.route("/auth/register", post(auth::register::<T>))
		.route("/auth/login", post(auth::login::<T>))
		.route("/gpus", get(gpus::list::<T>).post(gpus::create::<T>))
		.route(
			"/gpus/:id",
			get(gpus::get::<T>).put(gpus::update::<T>).delete(gpus::delete::<T>)
		)
		.route("/jobs", get(jobs::list::<T>).post(jobs::create::<T>))
		.route("/jobs/:id", get(jobs::get::<T>).put(jobs::update::<T>))
		.route("/reviews", get(reviews::list::<T>).post(reviews::create::<T>))
		.route("/transactions", get(transactions::list::<T>).post(transactions::create::<T>))
		.route("/transactions/:id", put(transactions::update::<T>))
		.with_state(state);

	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
		.allow_headers([CONTENT_TYPE])
		.max_age(Duration::from_secs(60 * 60));

	Router::new()
		.route("/", get(root_handler))
		.route("/health", get(health_handler))
		.nest("/api", api)
		.layer(middleware::from_fn(trace_request))
		.layer(cors)
}

// Run the API server with the provided storage backend
pub async fn run_server<T: MarketStorage + 'static>(storage: T, config: &Config) -> Result<()> {
	info!(backend = storage.backend_name(), ?config, "starting marketplace api");

	if config.seed_demo_data {
		seed_demo_data(&storage).await?;
	}

	let app = build_router(Arc::new(storage));

	let addr = SocketAddr::new(config.bind_addr, config.port);
	let listener = TcpListener::bind(addr).await?;
	info!("Server listening on {}", addr);

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	info!("Server stopped");
	Ok(())
}

// Root handler
async fn root_handler() -> &'static str {
	"GPU marketplace API. Resources live under /api (gpus, jobs, reviews, transactions, auth)."
}

async fn health_handler() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

// Wrap every request in a span carrying a fresh request id
async fn trace_request(request: Request, next: Next) -> Response {
	let request_id = Uuid::new_v4();
	let span = info_span!(
		"request",
		%request_id,
		method = %request.method(),
		path = %request.uri().path()
	);

	async move {
		let response = next.run(request).await;
		debug!(status = response.status().as_u16(), "request finished");
		response
	}
		.instrument(span).await
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			warn!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
		info!("Received Ctrl+C, shutting down");
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
				info!("Received terminate signal, shutting down");
			}
			Err(e) => {
				warn!("Failed to install signal handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
