use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wayfarer_api::{app, state::engine_config, AppState, AuthConfig};
use wayfarer_catalog::PricingCalculator;
use wayfarer_core::LogMailer;
use wayfarer_store::{Config, DbClient, PgRequestStore};
use wayfarer_workflow::WorkflowEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "wayfarer_api=debug,wayfarer_workflow=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Wayfarer API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let pricing = PricingCalculator::new(config.pricing.clone()).context("Invalid pricing config")?;
    let engine = WorkflowEngine::new(
        Arc::new(PgRequestStore::new(db.pool.clone())),
        pricing,
        engine_config(&config.workflow),
    )
    .with_mailer(Arc::new(LogMailer));

    let app_state = AppState {
        engine: Arc::new(engine),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
