//! SQLite connection pool and migration runner.
//!
//! The [`Database`] handle is built once at startup and cloned into every
//! module that needs storage. Each clone shares the same pool; connections
//! are checked out per operation and returned when dropped.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Migration, Module};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const MIGRATIONS_TABLE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Shared handle to the relational store.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool against the configured URL.
    ///
    /// In-memory databases live only as long as their connection, so they are
    /// pinned to a single connection that never idles out.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("invalid database url '{}'", settings.url))?
            .create_if_missing(true);

        let pool_options = if settings.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to '{}'", settings.url))?;

        tracing::info!(
            target: "bookshelf-db",
            url = %settings.url,
            in_memory = settings.is_in_memory(),
            "database pool ready"
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial statement to check the pool is usable.
    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    /// Apply every migration not yet recorded in `_migrations`.
    ///
    /// Each migration runs in its own transaction together with its ledger
    /// row, so a failing script leaves no trace. Returns how many were applied.
    pub async fn apply_migrations(
        &self,
        migrations: &[(String, Migration)],
    ) -> anyhow::Result<usize> {
        sqlx::raw_sql(MIGRATIONS_TABLE_DDL)
            .execute(&self.pool)
            .await
            .context("failed to create migrations ledger")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let already_applied: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM _migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await
                    .with_context(|| format!("failed to read ledger for {}/{}", module, migration.id))?;

            if already_applied.is_some() {
                tracing::debug!(target: "bookshelf-db", %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
            sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;
            tx.commit()
                .await
                .with_context(|| format!("failed to commit migration {}/{}", module, migration.id))?;

            tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Core `db` module: owns the pool for the lifetime of the process.
pub struct DatabaseModule {
    database: Database,
}

impl DatabaseModule {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.database.ping().await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.database.close().await;
        tracing::info!(module = self.name(), "database pool closed");
        Ok(())
    }
}

/// Create the core database module around an existing handle
pub fn create_module(database: Database) -> Arc<dyn Module> {
    Arc::new(DatabaseModule::new(database))
}
