use anyhow::Context;
use estate_portal_api::{app, init_tracing, AppConfig, AppState};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, IDENTITY_API_KEY, etc.
    let _ = dotenvy::dotenv();

    let development = !matches!(
        std::env::var("APP_ENV").as_deref(),
        Ok("production") | Ok("prod") | Ok("staging") | Ok("stage")
    );
    init_tracing(if development { "info,estate_portal_api=debug" } else { "info" });

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Refusing to start: {}", e);
            std::process::exit(2);
        }
    };
    info!("Starting Estate Portal API in {} mode", config.environment.as_str());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config).await?;
    let app = app::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Estate Portal API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
