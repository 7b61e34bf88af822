//! CodeStep · Lesson Validation Backend
//!
//! - Axum HTTP + WebSocket API over staged coding lessons
//! - Answer validation: normalization, solution matching, capture-driven templates
//! - Persisted per-lesson progress and course unlocks
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   LESSONS_CONFIG_PATH : path to a TOML lesson bank (added before the built-in lessons)
//!   STORE_PATH          : JSON file for progress; in-memory when unset
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod domain;
mod config;
mod seeds;
mod store;
mod engine;
mod course;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Lessons, progress store and hint strategy.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "codestep_backend", %addr, lessons = state.lessons.len(), "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
