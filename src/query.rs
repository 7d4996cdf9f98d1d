use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::binder::{ParameterBinder, ParameterSource};
use crate::error::{DbSqlError, Result};
use crate::mapper::{CurrentRow, FromRow, RowMapper};
use crate::traits::{DataReader, DbConnection, Shape};
use crate::types::{DbCommand, ResultColumns};

/// A single SQL statement bound to its own open connection.
///
/// A `Query` is single use: exactly one terminal operation (`execute`,
/// `read_many`, `read_first` or an async variant) may run on it. The
/// connection is released when that operation finishes, whether it succeeds
/// or fails, and any later operation fails with `QueryAlreadyDisposed`.
/// Dropping an unused query releases the connection as well.
///
/// # Example
/// ```ignore
/// let users: Vec<User> = controller
///     .query_with("SELECT * FROM users WHERE age > @age", AgeFilter { age: 18 })?
///     .read_many()?;
/// ```
pub struct Query {
    connection: Mutex<Option<Box<dyn DbConnection>>>,
    disposed: AtomicBool,
    binder: ParameterBinder,
    mapper: RowMapper,
    text: Option<String>,
    parameters: Option<Box<dyn ParameterSource>>,
}

impl Query {
    /// Wraps an already opened connection.
    pub(crate) fn new(
        connection: Box<dyn DbConnection>,
        binder: ParameterBinder,
        mapper: RowMapper,
    ) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
            disposed: AtomicBool::new(false),
            binder,
            mapper,
            text: None,
            parameters: None,
        }
    }

    /// Sets the SQL text. The last value set wins.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the object whose fields are bound as parameters. The last value set wins.
    pub fn parameters<P: Shape>(mut self, parameters: P) -> Self {
        self.parameters = Some(Box::new(parameters));
        self
    }

    /// Removes a previously set parameter object.
    pub fn clear_parameters(mut self) -> Self {
        self.parameters = None;
        self
    }

    /// In-place form of [`text`](Self::text); fails once the query is disposed.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<&mut Self> {
        self.ensure_open()?;
        self.text = Some(text.into());
        Ok(self)
    }

    /// In-place form of [`parameters`](Self::parameters); fails once the query is disposed.
    pub fn set_parameters<P: Shape>(&mut self, parameters: P) -> Result<&mut Self> {
        self.ensure_open()?;
        self.parameters = Some(Box::new(parameters));
        Ok(self)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Runs a command that returns no rows and returns the affected row count.
    pub fn execute(&mut self) -> Result<u64> {
        let text = self.command_text()?;
        let mut lease = self.acquire()?;
        let command = self.create_command(text, lease.connection())?;

        let affected = lease.connection().execute(&command)?;
        tracing::debug!(
            sql_len = command.text().len(),
            parameters = command.parameters().len(),
            affected,
            "Executed query"
        );
        Ok(affected)
    }

    /// Async version of [`execute`](Self::execute).
    pub async fn execute_async(&mut self) -> Result<u64> {
        let text = self.command_text()?;
        let mut lease = self.acquire()?;
        let command = self.create_command(text, lease.connection())?;

        let affected = lease.connection().execute_async(&command).await?;
        tracing::debug!(
            sql_len = command.text().len(),
            parameters = command.parameters().len(),
            affected,
            "Executed query"
        );
        Ok(affected)
    }

    /// Runs the query and maps every row into a default-constructed `T`.
    pub fn read_many<T: FromRow + Default>(&mut self) -> Result<Vec<T>> {
        self.read_many_with(T::default)
    }

    /// Runs the query and maps every row into a fresh instance from `factory`.
    /// The rows are fully read before the connection is released.
    pub fn read_many_with<T, F>(&mut self, mut factory: F) -> Result<Vec<T>>
    where
        T: FromRow,
        F: FnMut() -> T,
    {
        let text = self.command_text()?;
        let mut lease = self.acquire()?;
        let command = self.create_command(text, lease.connection())?;

        let mut reader = lease.connection().execute_reader(&command)?;
        let mut items = Vec::new();
        if reader.has_rows() {
            let columns = ResultColumns::from_reader(reader.as_ref())?;
            while reader.advance()? {
                items.push(self.materialize(reader.as_ref(), &columns, factory())?);
            }
        }
        tracing::debug!(sql_len = command.text().len(), rows = items.len(), "Read query rows");
        Ok(items)
    }

    /// Async version of [`read_many`](Self::read_many).
    pub async fn read_many_async<T: FromRow + Default>(&mut self) -> Result<Vec<T>> {
        self.read_many_with_async(T::default).await
    }

    /// Async version of [`read_many_with`](Self::read_many_with).
    pub async fn read_many_with_async<T, F>(&mut self, mut factory: F) -> Result<Vec<T>>
    where
        T: FromRow,
        F: FnMut() -> T + Send,
    {
        let text = self.command_text()?;
        let mut lease = self.acquire()?;
        let command = self.create_command(text, lease.connection())?;

        let mut reader = lease.connection().execute_reader_async(&command).await?;
        let mut items = Vec::new();
        if reader.has_rows() {
            let columns = ResultColumns::from_reader(reader.as_ref())?;
            while reader.advance_async().await? {
                items.push(self.materialize(reader.as_ref(), &columns, factory())?);
            }
        }
        tracing::debug!(sql_len = command.text().len(), rows = items.len(), "Read query rows");
        Ok(items)
    }

    /// Runs the query and maps the first row into a default-constructed `T`.
    /// Returns `None` when the query produced no rows.
    pub fn read_first<T: FromRow + Default>(&mut self) -> Result<Option<T>> {
        self.read_first_with(T::default)
    }

    pub fn read_first_with<T, F>(&mut self, factory: F) -> Result<Option<T>>
    where
        T: FromRow,
        F: FnOnce() -> T,
    {
        let text = self.command_text()?;
        let mut lease = self.acquire()?;
        let command = self.create_command(text, lease.connection())?;

        let mut reader = lease.connection().execute_reader(&command)?;
        if !reader.has_rows() || !reader.advance()? {
            tracing::debug!(sql_len = command.text().len(), rows = 0, "Read first query row");
            return Ok(None);
        }
        let columns = ResultColumns::from_reader(reader.as_ref())?;
        let item = self.materialize(reader.as_ref(), &columns, factory())?;
        tracing::debug!(sql_len = command.text().len(), rows = 1, "Read first query row");
        Ok(Some(item))
    }

    /// Async version of [`read_first`](Self::read_first).
    pub async fn read_first_async<T: FromRow + Default>(&mut self) -> Result<Option<T>> {
        self.read_first_with_async(T::default).await
    }

    /// Async version of [`read_first_with`](Self::read_first_with).
    pub async fn read_first_with_async<T, F>(&mut self, factory: F) -> Result<Option<T>>
    where
        T: FromRow,
        F: FnOnce() -> T + Send,
    {
        let text = self.command_text()?;
        let mut lease = self.acquire()?;
        let command = self.create_command(text, lease.connection())?;

        let mut reader = lease.connection().execute_reader_async(&command).await?;
        if !reader.has_rows() || !reader.advance_async().await? {
            tracing::debug!(sql_len = command.text().len(), rows = 0, "Read first query row");
            return Ok(None);
        }
        let columns = ResultColumns::from_reader(reader.as_ref())?;
        let item = self.materialize(reader.as_ref(), &columns, factory())?;
        tracing::debug!(sql_len = command.text().len(), rows = 1, "Read first query row");
        Ok(Some(item))
    }

    /// Releases the connection. Safe to call any number of times, from any thread.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let connection = self.connection.lock().take();
        if let Some(mut connection) = connection {
            release(connection.as_mut());
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(DbSqlError::QueryAlreadyDisposed);
        }
        Ok(())
    }

    // Checked before the connection is leased, so a query without text stays
    // usable.
    fn command_text(&self) -> Result<String> {
        self.ensure_open()?;
        match self.text.as_deref() {
            None => Err(DbSqlError::MissingCommandText),
            Some(text) if text.trim().is_empty() => Err(DbSqlError::InvalidArgument(
                "query text is empty".to_string(),
            )),
            Some(text) => Ok(text.to_string()),
        }
    }

    /// Moves the query to the disposed state and hands out its connection.
    /// Only one caller can ever obtain the lease.
    fn acquire(&self) -> Result<ConnectionLease> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(DbSqlError::QueryAlreadyDisposed);
        }
        let connection = self
            .connection
            .lock()
            .take()
            .ok_or(DbSqlError::QueryAlreadyDisposed)?;
        Ok(ConnectionLease { connection })
    }

    fn create_command(&self, text: String, connection: &mut dyn DbConnection) -> Result<DbCommand> {
        let mut command = connection.create_command(&text);
        if let Some(parameters) = &self.parameters {
            for parameter in parameters.bind(&self.binder)? {
                command.add_parameter(parameter);
            }
        }
        Ok(command)
    }

    fn materialize<T: FromRow>(
        &self,
        reader: &dyn DataReader,
        columns: &ResultColumns,
        seed: T,
    ) -> Result<T> {
        T::from_row(&self.mapper, &CurrentRow { reader, columns }, seed)
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Exclusive use of a query's connection for one terminal operation.
/// The connection is closed when the lease goes out of scope, on every path.
struct ConnectionLease {
    connection: Box<dyn DbConnection>,
}

impl ConnectionLease {
    fn connection(&mut self) -> &mut dyn DbConnection {
        self.connection.as_mut()
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        release(self.connection.as_mut());
    }
}

fn release(connection: &mut dyn DbConnection) {
    match connection.close() {
        Ok(()) => tracing::debug!("Released connection"),
        Err(e) => tracing::warn!(error = %e, "Failed to close connection"),
    }
}
