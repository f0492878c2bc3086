mod config;
mod crypto;
mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::db::{seed, settings::PgSettingsStore, training::PgProgressStore};
use crate::services::{
    access_rules::AccessRulesService, training::TrainingService, widget_settings::WidgetSettingsService,
};
use crate::state::{AppState, SharedState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Instant;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let cipher = crypto::FieldCipher::new(&config.enc_key)?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
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

    let settings_store = Arc::new(PgSettingsStore::new(pool.clone()));
    seed::seed_defaults(settings_store.as_ref()).await?;
    if let Some((email, password)) = &config.bootstrap_admin {
        seed::seed_admin(&pool, &cipher, email, password).await?;
    }

    // A failed load leaves the compiled-in page defaults in charge and every widget hidden.
    let access_rules = AccessRulesService::new(settings_store.clone());
    if let Err(e) = access_rules.refresh().await {
        tracing::warn!("Page access rules not loaded, using defaults: {}", e);
    }
    let widgets = WidgetSettingsService::new(settings_store);
    if let Err(e) = widgets.refresh().await {
        tracing::warn!("Widget settings not loaded, widgets hidden: {}", e);
    }
    let training = TrainingService::new(
        Arc::new(PgProgressStore::new(pool.clone())),
        config.training.clone(),
    );

    let shared: SharedState = Arc::new(AppState::new(
        pool,
        &config,
        cipher,
        access_rules,
        widgets,
        training,
    ));

    let scheduler = JobScheduler::new().await?;

    // Sign-in limiter cleanup - hourly
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                state.login_limiter.cleanup().await;
            })
        })?)
        .await?;

    // Watch sessions whose player never sent a teardown - every minute
    let shared_for_flush = shared.clone();
    scheduler
        .add(Job::new_async("0 * * * * *", move |_uuid, _l| {
            let state = shared_for_flush.clone();
            Box::pin(async move {
                let flushed = state.training.flush_idle(Instant::now()).await;
                if flushed > 0 {
                    tracing::info!(
                        "Flushed {} idle watch sessions, {} still open",
                        flushed,
                        state.training.open_sessions().await
                    );
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Sign-in limiter cleanup: hourly");
    tracing::info!(
        "  - Idle watch session flush: every minute (idle after {}s)",
        config.training.idle_flush_after.as_secs()
    );

    let app = web::app(shared, "static");

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}
