use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use reventa::api::middleware::auth::AppState;
use reventa::config::Config;
use reventa::db;
use reventa::services::notifications::{EmailClient, Notifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reventa=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Reventa server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Outbound email is optional; without it notifications stay in-app only
    let email = match (&config.email_api_url, &config.email_api_key) {
        (Some(url), Some(key)) => {
            let base_url = Url::parse(url)?;
            tracing::info!(%base_url, "Email delivery enabled");
            Some(EmailClient::new(base_url, key.clone()))
        }
        _ => {
            tracing::info!("Email delivery not configured, notifications are in-app only");
            None
        }
    };
    let notifier = Notifier::new(pool.clone(), email);

    // Build application state
    let state = AppState {
        pool,
        config: config.clone(),
        notifier,
    };

    // Build router
    let app = Router::new()
        .route("/health", get(reventa::api::health::health_check))
        .merge(reventa::api::events::router())
        .merge(reventa::api::tickets::router())
        .merge(reventa::api::orders::router())
        .merge(reventa::api::profile::router())
        .merge(reventa::api::disputes::router())
        .merge(reventa::api::payments::router())
        .merge(reventa::api::notifications::router())
        .merge(reventa::api::admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
