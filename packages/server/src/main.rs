use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use server::config::AppConfig;
use server::scoring::{HttpDatasetResolver, ScoringEngine};
use server::state::AppState;
use server::views::{ViewHub, ViewPropagator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let resolver = HttpDatasetResolver::new(Duration::from_secs(config.resolver.timeout_secs))
        .context("Failed to build dataset resolver")?;

    let views = ViewPropagator::new(Arc::new(ViewHub::new()), Arc::new(ViewHub::new()));
    let engine = Arc::new(ScoringEngine::new(
        db.clone(),
        Arc::new(resolver),
        views.clone(),
    ));

    // Requeue anything left unscored by a previous run, then host the views.
    engine
        .recover_pending()
        .await
        .context("Failed to recover deferred submissions")?;
    server::seed::seed_views(&db, &views)
        .await
        .context("Failed to host view tables")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        db,
        config,
        engine,
        views,
    };

    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
