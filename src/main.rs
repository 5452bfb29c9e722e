use dotenvy::dotenv;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticket_server::config::Config;
use ticket_server::routes::create_routes;
use ticket_server::services::RandomCodeGenerator;
use ticket_server::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env().map_err(|e| format!("Invalid configuration: {e}"))?;

    let pool = config
        .connect_database()
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;
    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| format!("Failed to run migrations: {e}"))?;
    tracing::info!("Migrations run successfully");

    let sessions = config
        .connect_session_store()
        .await
        .map_err(|e| format!("Failed to connect to Redis: {e}"))?;

    let state = AppState::new(
        pool,
        config.token_service(),
        Arc::new(sessions),
        Arc::new(RandomCodeGenerator),
        config.order_lock_timeout,
    );
    let app = create_routes(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server failed: {e}"))
}
