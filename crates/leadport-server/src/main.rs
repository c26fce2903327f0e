//! Leadport server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use leadport_billing::StripeGateway;
use leadport_db::{DbManager, run_migrations};
use leadport_server::{AppState, ServerConfig, bootstrap, build_router};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), String> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;

    let db = DbManager::connect(&config.db)
        .await
        .map_err(|e| format!("database connection failed: {e}"))?;
    let version = run_migrations(db.client())
        .await
        .map_err(|e| format!("migrations failed: {e}"))?;
    info!(schema_version = version, "Schema up to date");

    if config.stripe.secret_key.is_empty() || config.stripe.webhook_secret.is_empty() {
        warn!("Stripe is not configured; checkout and webhooks will fail");
    }
    let gateway = Arc::new(StripeGateway::new(config.stripe.clone()));
    let state = AppState::new(db.client().clone(), &config, gateway);

    if let Some(boot) = &config.bootstrap {
        bootstrap::run(db.client(), &state.auth, boot)
            .await
            .map_err(|e| format!("bootstrap failed: {e}"))?;
    }

    tokio::spawn(maintenance(state.clone()));

    let app = build_router(state, &config.stripe.public_url);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| format!("bind {} failed: {e}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Leadport listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown_signal())
    .await
    .map_err(|e| format!("server error: {e}"))?;

    info!("Leadport stopped");
    Ok(())
}

/// Periodic housekeeping: idle rate-limit entries and expired sessions.
async fn maintenance(state: AppState) {
    let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
    loop {
        ticker.tick().await;
        state.rate_limiter.prune();
        if let Err(e) = state.auth.purge_expired_sessions().await {
            warn!(error = %e, "Session purge failed");
        }
    }
}

/// JSON logs unless `LOG_FORMAT=pretty`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("leadport=info,tower_http=info"));
    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("pretty"));

    if pretty {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received");
}
