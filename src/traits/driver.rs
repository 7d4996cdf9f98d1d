use async_trait::async_trait;

use crate::error::{DbSqlError, Result};
use crate::types::{DbCommand, DbParameter, SqlType, SqlValue};

/// Trait for database provider implementations.
/// A provider creates connections from a connection string and
/// the parameter objects attached to commands.
pub trait ProviderFactory: Send + Sync {
    /// Provider identity, e.g. `"postgres"`.
    fn name(&self) -> &str;

    /// Creates a connection that has not been opened yet.
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DbConnection>>;

    /// Creates a driver parameter.
    fn create_parameter(&self, name: &str, sql_type: SqlType, value: SqlValue) -> DbParameter {
        DbParameter::new(name, sql_type, value)
    }
}

/// A single database connection.
///
/// Blocking and async methods are both part of the contract. Once open, by
/// either method, a connection serves both kinds of call.
#[async_trait]
pub trait DbConnection: Send {
    fn open(&mut self) -> Result<()>;

    async fn open_async(&mut self) -> Result<()>;

    fn create_command(&self, text: &str) -> DbCommand {
        DbCommand::new(text)
    }

    /// Runs a command that returns no rows. Returns the affected row count.
    fn execute(&mut self, command: &DbCommand) -> Result<u64>;

    async fn execute_async(&mut self, command: &DbCommand) -> Result<u64>;

    /// Runs a command and returns a cursor over its rows.
    fn execute_reader(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>>;

    async fn execute_reader_async(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>>;

    fn close(&mut self) -> Result<()>;
}

/// Forward-only cursor over a result set.
/// Positioned before the first row until `advance` returns true.
#[async_trait]
pub trait DataReader: Send {
    fn has_rows(&self) -> bool;

    /// Moves to the next row. Returns false once the rows are exhausted.
    fn advance(&mut self) -> Result<bool>;

    async fn advance_async(&mut self) -> Result<bool> {
        self.advance()
    }

    /// True while the cursor sits on a row.
    fn on_row(&self) -> bool;

    fn field_count(&self) -> usize;

    fn field_name(&self, index: usize) -> Result<&str>;

    /// Value of the current row at the given column ordinal.
    fn get(&self, index: usize) -> Result<SqlValue>;

    /// Value of the current row for the given column name.
    fn get_by_name(&self, name: &str) -> Result<SqlValue> {
        for index in 0..self.field_count() {
            if self.field_name(index)? == name {
                return self.get(index);
            }
        }
        Err(DbSqlError::ColumnNotFound(name.to_string()))
    }
}
