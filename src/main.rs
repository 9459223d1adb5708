mod analytics;
mod config;
mod crypto;
mod db;
mod domain;
mod error;
mod middleware;
mod services;
mod state;
mod store;
mod web;

use crate::config::Config;
use crate::crypto::FieldCipher;
use crate::middleware::RateLimiter;
use crate::services::ai::AiService;
use crate::services::identity::{IdentityDirectory, MemoryIdentityDirectory, PgIdentityDirectory};
use crate::state::{AppState, SharedState};
use crate::store::{MemoryStore, PgStore, ReviewStore};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (store, identity): (Arc<dyn ReviewStore>, Arc<dyn IdentityDirectory>) =
        match (&config.database_url, &config.enc_key) {
            (Some(database_url), Some(enc_key)) => {
                tracing::info!("Connecting to database...");
                let pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(database_url)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to database: {}", e);
                        e
                    })?;
                tracing::info!("Database connection established");

                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to run database migrations: {}", e);
                        e
                    })?;
                tracing::info!("Database migrations completed");

                let cipher = Arc::new(FieldCipher::from_key_bytes(enc_key)?);
                (
                    Arc::new(PgStore::new(pool.clone(), cipher)) as Arc<dyn ReviewStore>,
                    Arc::new(PgIdentityDirectory::new(pool)) as Arc<dyn IdentityDirectory>,
                )
            }
            _ => {
                tracing::warn!(
                    "DATABASE_URL not set, using the in-memory store; data is lost on restart"
                );
                (
                    Arc::new(MemoryStore::new()) as Arc<dyn ReviewStore>,
                    Arc::new(MemoryIdentityDirectory::new()) as Arc<dyn IdentityDirectory>,
                )
            }
        };

    db::seed::seed_all(store.as_ref(), identity.as_ref(), config.admin.as_ref()).await?;

    let ai = match &config.openai_api_key {
        Some(key) => Some(Arc::new(AiService::new(key.clone(), config.openai_model.clone()))),
        None => {
            tracing::info!("OPENAI_API_KEY not set, feedback summaries disabled");
            None
        }
    };

    let shared: SharedState = Arc::new(AppState {
        store,
        identity,
        ai,
        session_key: config.session_key.clone(),
        login_limiter: RateLimiter::new(state::LOGIN_ATTEMPTS, state::LOGIN_WINDOW_SECS),
        cookie_secure: config.cookie_secure,
        trust_forwarded_for: config.trust_forwarded_for,
    });

    let scheduler = JobScheduler::new().await?;

    // Login limiter cleanup - hourly
    let limiter = shared.login_limiter.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let limiter = limiter.clone();
            Box::pin(async move {
                limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started: login limiter cleanup hourly");

    let app = Router::new()
        .merge(web::routes(shared))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
