pub mod api;
pub mod background;
pub mod config;
pub mod contacts;
pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod registrar;
pub mod remote;
pub mod segments;
pub mod types;

#[cfg(test)]
mod testutils;

use config::Config;
use errors::ApiError;
use registrar::Registrar;
use shared::ServeError;
use shared::admin_service::AdminService;
use shared::http::{bind, run_http_service};
use std::future::Future;
use tokio::sync::watch;

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("invalid config: {0}")]
    Config(#[from] config::ValidationError),
    #[error("could not build API client: {0}")]
    Client(#[from] ApiError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("admin listener failed: {0}")]
    Admin(#[from] ServeError),
}

/// Runs the registration endpoint and the admin listener until `shutdown`
/// resolves, then waits for queued background work to finish.
pub async fn run<F>(config: Config, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;

    let (registrar, worker) = Registrar::from_config(&config)?;
    if registrar.status().ready {
        tracing::info!("marketing API credential loaded");
    } else {
        tracing::warn!(
            env = %config.remote.api_key_env,
            "no marketing API credential configured; registrations will fail"
        );
    }

    let public = bind(&config.listener.host, config.listener.port).await?;
    let admin = bind(&config.admin_listener.host, config.admin_listener.port).await?;
    tracing::info!(
        "listening on {}:{} (admin {}:{})",
        config.listener.host,
        config.listener.port,
        config.admin_listener.host,
        config.admin_listener.port
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let status_source = registrar.clone();
    let admin_service = AdminService::new(move || status_source.status());

    let result = tokio::try_join!(
        async {
            api::serve(public, registrar, stopped(stop_rx.clone())).await?;
            Ok::<_, ServiceError>(())
        },
        async {
            run_http_service(admin, admin_service, stopped(stop_rx.clone())).await?;
            Ok::<_, ServiceError>(())
        },
    );

    tracing::info!("listeners stopped, draining background segments");
    worker.drain().await;

    result.map(|_| ())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = rx.wait_for(|stop| *stop).await;
}
