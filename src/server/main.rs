//! keysmith license server.
//!
//! Configuration comes from `config.toml` (optional) and environment
//! variables; see `KeysmithConfig` for the keys.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use keysmith::config::KeysmithConfig;
use keysmith::errors::{LicenseError, LicenseResult};
use keysmith::server::{authenticator_from_config, build_router, init_tracing, AppState, Database};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The subscriber may not be installed yet.
        eprintln!("keysmith_server: {e}");
        error!("server exited with error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> LicenseResult<()> {
    let config = KeysmithConfig::load()?;
    config.validate()?;

    init_tracing(&config.logging)?;

    let db = Database::connect(&config.database).await?;
    db.migrate().await?;

    let auth = authenticator_from_config(&config.auth)?;
    info!(
        "Admin authentication: {}, store: {}",
        auth.scheme(),
        db.backend_name()
    );

    let state = AppState::new(db.clone(), auth);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| LicenseError::ConfigError(format!("invalid listen address: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LicenseError::ServerError(format!("failed to bind {addr}: {e}")))?;

    info!("License server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LicenseError::ServerError(format!("server error: {e}")))?;

    info!("Shutting down, closing database pool");
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
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
}
