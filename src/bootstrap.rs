//! Startup sequence: connect, register, migrate, init, serve, stop.

use anyhow::Context;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_kernel::settings::Settings;
use bookshelf_kernel::{InitCtx, ModuleRegistry};

use crate::modules;

/// Build a registry holding the core `db` module and every project module.
pub fn build_registry(db: &Database) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register_core(bookshelf_db::create_module(db.clone()));
    modules::register_all(&mut registry, db);
    registry
}

/// Connect to storage and bring the schema up to date.
pub async fn prepare(settings: &Settings) -> anyhow::Result<(Database, ModuleRegistry)> {
    let db = Database::connect(&settings.database)
        .await
        .context("failed to open database")?;
    let registry = build_registry(&db);

    let applied = db
        .apply_migrations(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, "migrations up to date");

    Ok((db, registry))
}

/// Apply pending migrations and return how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let db = Database::connect(&settings.database)
        .await
        .context("failed to open database")?;
    let registry = build_registry(&db);
    let applied = db.apply_migrations(&registry.collect_migrations()).await?;
    db.close().await;
    Ok(applied)
}

/// Prepared, initialized router. The registry is returned so callers can
/// run the stop hooks.
pub async fn build_app(settings: &Settings) -> anyhow::Result<(Router, ModuleRegistry)> {
    let (_db, registry) = prepare(settings).await?;
    let ctx = InitCtx { settings };
    registry.init_all(&ctx).await?;

    let router = bookshelf_http::build_router(&registry, &settings.server);
    Ok((router, registry))
}

/// Run the service until shutdown, then stop every module.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let (_db, registry) = prepare(settings).await?;
    let ctx = InitCtx { settings };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;
    tracing::info!("bookshelf bootstrap complete");

    let served = bookshelf_http::start_server(&registry, &settings.server).await;

    registry
        .stop_all()
        .await
        .context("failed to stop modules cleanly")?;

    served
}
