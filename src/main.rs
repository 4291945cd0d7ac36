use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use review_roster::config::Config;
use review_roster::engine::{PullRequestEngine, TeamEngine, ThreadRngSelector, UserEngine};
use review_roster::http::{router, AppState};
use review_roster::store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting review roster service");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let db_path = config.state_dir.join("review-roster.db");
    info!("Using state database: {}", db_path.display());
    let store =
        Arc::new(SqliteStore::new(&db_path).expect("Failed to initialize SQLite database"));

    let app_state = Arc::new(AppState {
        pull_requests: PullRequestEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(ThreadRngSelector),
        ),
        teams: TeamEngine::new(store.clone(), store.clone()),
        users: UserEngine::new(store.clone(), store.clone(), store.clone()),
    });

    let app = router(app_state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
