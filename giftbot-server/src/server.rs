// src/server.rs

use std::net::SocketAddr;
use std::time::Duration;
use axum_server::Handle;
use tracing::{error, info};

use giftbot_core::Error;
use crate::api::build_router;
use crate::config::Config;
use crate::context::ServerContext;

const HTTP_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub async fn run_server(config: Config) -> Result<(), Error> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address: {}", e)))?;

    // 1) Wire everything up
    let ctx = ServerContext::new(config).await?;

    // 2) Background redemption
    ctx.start_jobs().await;

    // 3) HTTP
    let app = build_router(ctx.api_state());
    let handle = Handle::new();
    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service());
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("HTTP server error: {}", e);
        }
        info!("HTTP server shut down.");
    });
    info!("Listening on http://{}", addr);

    // 4) Wait for Ctrl-C
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutdown signal received.");

    // 5) Drain HTTP, stop jobs, close the pool
    handle.graceful_shutdown(Some(HTTP_SHUTDOWN_GRACE));
    if let Err(e) = server_task.await {
        error!("HTTP server task failed: {}", e);
    }
    ctx.scheduler.stop().await;
    ctx.db.close().await;
    info!("Shutdown complete.");
    Ok(())
}
