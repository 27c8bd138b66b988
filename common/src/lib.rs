//! Shared core of the GPU marketplace backend: entity models, the storage
//! facade and its in-memory implementation, and the axum REST layer.
//!
//! Each backend binary builds its storage, then hands it to
//! [`server::run_server`].

pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod password;
pub mod routes;
pub mod seed;
pub mod server;
pub mod storage;
