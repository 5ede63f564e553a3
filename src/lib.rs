//! # carprice
//!
//! An authenticated car price prediction service on a from-scratch async
//! HTTP/1.1 stack.
//!
//! A `POST /predict` request carries one car's attributes. It must present a
//! valid bearer token *and* the static API key; the price is then served
//! from a read-through cache in front of the model and reported in the
//! configured currency.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use carprice::app::{AppState, build_pipeline};
//! use carprice::config::Settings;
//! use carprice::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let server = Server::bind(&settings.bind_addr).await?;
//!     let pipeline = Arc::new(build_pipeline(Arc::new(AppState::from_settings(settings))));
//!     server.run(move |req| {
//!         let pipeline = Arc::clone(&pipeline);
//!         async move { pipeline.handle(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

// ── Transport ─────────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Service ───────────────────────────────────────────────────────────────────
pub mod app;
pub mod cache;
pub mod config;
pub mod features;
pub mod inference;
pub mod prediction;
pub mod security;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
