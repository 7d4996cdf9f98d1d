use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::config::{ConnectionSettings, ConnectionStrings};
use crate::controller::DbController;
use crate::drivers::PostgresProvider;
use crate::error::{DbSqlError, Result};
use crate::schema::ShapeRegistry;
use crate::traits::ProviderFactory;

static GLOBAL: Lazy<DbControllers> = Lazy::new(DbControllers::new);

/// Cache of [`DbController`]s keyed by provider and connection string.
///
/// Controllers are created on first request and reused afterwards; the cache
/// is never cleared. Providers are looked up by name; `"postgres"` is
/// registered by default.
pub struct DbControllers {
    providers: RwLock<HashMap<String, Arc<dyn ProviderFactory>>>,
    controllers: Mutex<HashMap<(String, String), Arc<DbController>>>,
    registry: Arc<ShapeRegistry>,
}

impl DbControllers {
    pub fn new() -> Self {
        Self::with_registry(ShapeRegistry::global())
    }

    /// Controllers created by this cache share `registry`.
    pub fn with_registry(registry: Arc<ShapeRegistry>) -> Self {
        let controllers = Self {
            providers: RwLock::new(HashMap::new()),
            controllers: Mutex::new(HashMap::new()),
            registry,
        };
        controllers.register_provider(Arc::new(PostgresProvider));
        controllers
    }

    /// The process-wide instance, created on first use.
    pub fn global() -> &'static DbControllers {
        &GLOBAL
    }

    /// Registers a provider under its own name, replacing any previous one.
    /// Controllers already handed out keep the provider they were created with.
    pub fn register_provider(&self, provider: Arc<dyn ProviderFactory>) {
        self.providers
            .write()
            .insert(provider.name().to_string(), provider);
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn ProviderFactory>> {
        self.providers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbSqlError::UnknownProvider(name.to_string()))
    }

    /// Returns the controller for `settings`, creating it on first use.
    #[tracing::instrument(level = "debug", skip(self, settings), fields(name = %settings.name))]
    pub fn controller(&self, settings: &ConnectionSettings) -> Result<Arc<DbController>> {
        let provider = self.provider(&settings.provider)?;
        let key = (
            settings.provider.clone(),
            settings.connection_string.clone(),
        );

        let mut controllers = self.controllers.lock();
        let controller = controllers.entry(key).or_insert_with(|| {
            tracing::debug!(provider = %settings.provider, "Creating controller");
            Arc::new(DbController::with_registry(
                provider,
                settings.connection_string.clone(),
                Arc::clone(&self.registry),
            ))
        });
        Ok(Arc::clone(controller))
    }

    /// Resolves `name` in `strings` and returns its controller.
    pub fn controller_named(
        &self,
        strings: &ConnectionStrings,
        name: &str,
    ) -> Result<Arc<DbController>> {
        self.controller(strings.get(name)?)
    }

    pub fn len(&self) -> usize {
        self.controllers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.lock().is_empty()
    }
}

impl Default for DbControllers {
    fn default() -> Self {
        Self::new()
    }
}
