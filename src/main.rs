// src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use manufacturing_analytics::{
    config::{AppConfig, AppState},
    routes::build_router,
    scheduler::spawn_daily_schedule,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // If configuration or the database fail, the service must not start.
    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let schedule_at = config.schedule_at;

    let app_state = AppState::new(config).await?;

    if let Some(run_at) = schedule_at {
        spawn_daily_schedule(app_state.clone(), run_at);
        tracing::info!(%run_at, "⏰ In-process daily analytics schedule enabled");
    }

    let app = build_router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
