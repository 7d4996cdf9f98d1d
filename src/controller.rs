use std::fmt;
use std::sync::Arc;

use crate::binder::ParameterBinder;
use crate::drivers::PostgresProvider;
use crate::error::Result;
use crate::mapper::RowMapper;
use crate::query::Query;
use crate::schema::ShapeRegistry;
use crate::traits::{DbConnection, ProviderFactory, Shape};

/// Main entry point for dbsql.
/// Holds a provider and a connection string, and hands out [`Query`] objects
/// that each own a freshly opened connection.
#[derive(Clone)]
pub struct DbController {
    provider: Arc<dyn ProviderFactory>,
    connection_string: String,
    registry: Arc<ShapeRegistry>,
}

impl DbController {
    /// Create a controller for a provider, sharing the process-wide schema cache.
    pub fn new(provider: Arc<dyn ProviderFactory>, connection_string: impl Into<String>) -> Self {
        Self::with_registry(provider, connection_string, ShapeRegistry::global())
    }

    /// Create a controller with its own schema cache.
    /// Useful for testing or for a custom type registry.
    pub fn with_registry(
        provider: Arc<dyn ProviderFactory>,
        connection_string: impl Into<String>,
        registry: Arc<ShapeRegistry>,
    ) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
            registry,
        }
    }

    /// Create a controller for a PostgreSQL database.
    ///
    /// # Example
    /// ```ignore
    /// let controller = DbController::postgres("host=localhost user=postgres dbname=app");
    /// let count = controller.query_text("SELECT COUNT(*) FROM users")?.read_first::<i64>()?;
    /// ```
    pub fn postgres(connection_string: impl Into<String>) -> Self {
        Self::new(Arc::new(PostgresProvider), connection_string)
    }

    pub fn provider(&self) -> &Arc<dyn ProviderFactory> {
        &self.provider
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn registry(&self) -> &Arc<ShapeRegistry> {
        &self.registry
    }

    /// Opens a connection and returns a query without text or parameters.
    pub fn query(&self) -> Result<Query> {
        let mut connection = self.provider.create_connection(&self.connection_string)?;
        connection.open()?;
        Ok(self.wrap(connection))
    }

    /// Opens a connection and returns a query with text but no parameters.
    pub fn query_text(&self, text: impl Into<String>) -> Result<Query> {
        Ok(self.query()?.text(text))
    }

    /// Opens a connection and returns a query with text and parameters.
    pub fn query_with<P: Shape>(&self, text: impl Into<String>, parameters: P) -> Result<Query> {
        Ok(self.query()?.text(text).parameters(parameters))
    }

    /// Async version of [`query`](Self::query).
    pub async fn query_async(&self) -> Result<Query> {
        let mut connection = self.provider.create_connection(&self.connection_string)?;
        connection.open_async().await?;
        Ok(self.wrap(connection))
    }

    /// Async version of [`query_text`](Self::query_text).
    pub async fn query_text_async(&self, text: impl Into<String>) -> Result<Query> {
        Ok(self.query_async().await?.text(text))
    }

    /// Async version of [`query_with`](Self::query_with).
    pub async fn query_with_async<P: Shape>(
        &self,
        text: impl Into<String>,
        parameters: P,
    ) -> Result<Query> {
        Ok(self.query_async().await?.text(text).parameters(parameters))
    }

    fn wrap(&self, connection: Box<dyn DbConnection>) -> Query {
        Query::new(
            connection,
            ParameterBinder::new(Arc::clone(&self.registry), Arc::clone(&self.provider)),
            RowMapper::new(Arc::clone(&self.registry)),
        )
    }
}

impl fmt::Debug for DbController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbController")
            .field("provider", &self.provider.name())
            .field("connection_string", &self.connection_string)
            .finish()
    }
}
