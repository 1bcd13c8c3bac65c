mod calls;
mod config;
mod db;
mod errors;
mod intake;
mod llm_client;
mod mailer;
mod models;
mod referrals;
mod routes;
mod sentiment;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod validation;
mod webhook;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::calls::VapiCaller;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::mailer::ResendMailer;
use crate::routes::build_router;
use crate::sentiment::LlmSentimentClassifier;
use crate::state::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Fails fast only when DATABASE_URL is missing
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting refcheck API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(db));

    let caller = Arc::new(VapiCaller::new(config.vapi.clone()));
    let mailer = Arc::new(ResendMailer::new(config.mail.clone()));

    // Without a key every completed call fails closed with source "missing_key"
    let llm = match config.classifier.api_key.clone() {
        Some(key) => {
            info!("Sentiment classifier enabled (model: {})", config.classifier.model);
            Some(LlmClient::new(key, config.classifier.model.clone()))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; completed calls will need a human check");
            None
        }
    };
    let classifier = Arc::new(LlmSentimentClassifier::new(llm));

    if config.webhook_token.is_none() {
        warn!("WEBHOOK_TOKEN not set; webhook deliveries are not authenticated");
    }

    let state = AppState {
        store,
        caller,
        classifier,
        mailer,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the dashboard host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
