use std::sync::Arc;
use std::time::Duration;

use recruit_onboard::config::AppConfig;
use recruit_onboard::onboarding::{
    OnboardingDeps, OnboardingRouteState, QueuedResumeAuthoring, SessionRegistry,
    onboarding_routes, spawn_eviction_task,
};
use recruit_onboard::store::{FlagStore, LibSqlBackend};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("Recruit Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding/sessions", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(LibSqlBackend::new_local(&config.db_path).await.map_err(|e| {
        eprintln!(
            "Error: Failed to open database at {}: {}",
            config.db_path.display(),
            e
        );
        e
    })?);

    eprintln!("   Database: {}", config.db_path.display());

    // ── Onboarding ───────────────────────────────────────────────────────
    let flags: Arc<dyn FlagStore> = db.clone();
    let deps = OnboardingDeps::new(db.clone())
        .with_authoring(Arc::new(QueuedResumeAuthoring::new(Arc::clone(&flags))))
        .with_persist_timeout(config.persist_timeout);

    let sessions = Arc::new(SessionRegistry::new(config.session_idle_timeout));
    // Sweep idle sessions every 60s
    let _eviction_handle = spawn_eviction_task(Arc::clone(&sessions), Duration::from_secs(60));

    let app = onboarding_routes(OnboardingRouteState::new(deps, flags, sessions))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
