use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core module initialization order. Custom modules come after all of these.
const CORE_MODULE_ORDER: &[&str] = &[
    "db", // Database pool; every custom module reads or writes through it
];

/// Module registry for managing module lifecycle with core/custom separation
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register a core module with the registry
    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        self.core_modules.push(module);
    }

    /// Register a custom module with the registry
    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// Get all registered modules (core + custom)
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .collect()
    }

    /// Core modules in the order they must be brought up
    fn ordered_core_modules(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn Module>> {
        CORE_MODULE_ORDER
            .iter()
            .filter_map(|&name| self.core_modules.iter().find(|m| m.name() == name))
    }

    /// Initialize core modules in order, then custom modules in registration order
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            "initializing core modules in order: {:?}",
            CORE_MODULE_ORDER
        );

        for module in self.ordered_core_modules() {
            tracing::info!(module = module.name(), "initializing core module");
            module.init(ctx).await.with_context(|| {
                format!("failed to initialize core module '{}'", module.name())
            })?;
        }

        tracing::info!("initializing {} custom modules", self.custom_modules.len());

        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "initializing custom module");
            module.init(ctx).await.with_context(|| {
                format!("failed to initialize custom module '{}'", module.name())
            })?;
        }

        Ok(())
    }

    /// Start core modules in order, then custom modules
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.ordered_core_modules() {
            tracing::info!(module = module.name(), "starting core module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start core module '{}'", module.name()))?;
        }

        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "starting custom module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start custom module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop custom modules in reverse registration order, then core modules
    /// in reverse of their startup order
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        tracing::info!("stopping {} custom modules", self.custom_modules.len());

        for module in self.custom_modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping custom module");
            module
                .stop()
                .await
                .with_context(|| format!("failed to stop custom module '{}'", module.name()))?;
        }

        for module in self.ordered_core_modules().rev() {
            tracing::info!(module = module.name(), "stopping core module");
            module
                .stop()
                .await
                .with_context(|| format!("failed to stop core module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all migrations from all modules (core + custom), sorted by
    /// module name and migration id
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (module.name().to_string(), migration))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));

        migrations
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::Mutex;

    struct RecordingModule {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Module for RecordingModule {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("init:{}", self.name));
            Ok(())
        }

        async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            Ok(())
        }

        fn migrations(&self) -> Vec<Migration> {
            vec![
                Migration {
                    id: "002_index",
                    up: "CREATE INDEX idx ON t (c);",
                },
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE t (c INTEGER);",
                },
            ]
        }
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Module> {
        Arc::new(RecordingModule {
            name,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn empty_registry_has_no_modules_or_migrations() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
        assert!(registry.collect_migrations().is_empty());
    }

    #[test]
    fn migrations_are_sorted_by_module_then_id() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_custom(recording("books", &log));
        registry.register_core(recording("db", &log));

        let ids: Vec<(String, &str)> = registry
            .collect_migrations()
            .into_iter()
            .map(|(module, m)| (module, m.id))
            .collect();

        assert_eq!(
            ids,
            vec![
                ("books".to_string(), "001_init"),
                ("books".to_string(), "002_index"),
                ("db".to_string(), "001_init"),
                ("db".to_string(), "002_index"),
            ]
        );
    }

    #[tokio::test]
    async fn lifecycle_runs_core_first_and_stops_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_custom(recording("books", &log));
        registry.register_custom(recording("reviews", &log));
        registry.register_core(recording("db", &log));

        let settings = Settings::default();
        let ctx = InitCtx {
            settings: &settings,
        };

        registry.init_all(&ctx).await.unwrap();
        registry.start_all(&ctx).await.unwrap();
        registry.stop_all().await.unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "init:db",
                "init:books",
                "init:reviews",
                "start:db",
                "start:books",
                "start:reviews",
                "stop:reviews",
                "stop:books",
                "stop:db",
            ]
        );
    }
}
