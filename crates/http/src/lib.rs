//! HTTP server facade for bookshelf with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{routing::get, Router};

use bookshelf_kernel::settings::ServerSettings;
use bookshelf_kernel::ModuleRegistry;

pub mod error;
pub mod extract;
pub mod router;

pub use error::AppError;
pub use extract::{ValidatedJson, ValidatedPath};
use router::RouterBuilder;

/// Serve the registry's modules until Ctrl-C is received
pub async fn start_server(registry: &ModuleRegistry, settings: &ServerSettings) -> anyhow::Result<()> {
    let app = build_router(registry, settings);

    let listener = tokio::net::TcpListener::bind(settings.socket_addr())
        .await
        .with_context(|| format!("failed to bind to {}", settings.socket_addr()))?;

    tracing::info!("HTTP server listening on http://{}", settings.socket_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &ServerSettings) -> Router {
    let mut router_builder = RouterBuilder::new()
        .with_api_prefix(&settings.api_prefix)
        .route("/healthz", get(health_check));

    for module in registry.modules() {
        let module_name = module.name();
        let module_router = module.routes();
        if !module_router.has_routes() {
            continue;
        }

        tracing::info!(
            module = module_name,
            "mounting module routes under {}",
            router_builder.module_path(module_name)
        );
        router_builder = router_builder.mount_module(module_name, module_router);
    }

    // Layers wrap everything registered above, so they go last
    router_builder
        .with_openapi(registry)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
