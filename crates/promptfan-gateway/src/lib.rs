//! HTTP gateway for promptfan.
//!
//! Exposes the batch orchestrator over axum:
//!
//! - `POST /generate` with `{"parallel": bool}` runs one batch
//! - `GET /health` reports liveness

pub mod server;

pub use server::GatewayServer;
