//! tutor-market HTTP Server
//!
//! Axum-based JSON API for the tutoring marketplace: accounts, availability,
//! bookings, payments, courses, reviews and messaging.

mod auth;
mod config;
mod error;
mod handlers;
mod routes;
mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config);

    tracing::info!(
        provider = %state.payments.provider_name(),
        currency = %config.payments.currency,
        lock_timeout_ms = config.lock_timeout.as_millis(),
        "Services ready"
    );

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("tutor-market server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
