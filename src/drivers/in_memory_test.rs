use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{DbSqlError, Result};
use crate::traits::{DataReader, DbConnection, ProviderFactory};
use crate::types::{BufferedReader, DbCommand, DbParameter, ResultSet, SqlValue};

/// A recorded command execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub text: String,
    pub parameters: Vec<DbParameter>,
}

/// A canned reply to the next executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum TestResponse {
    /// Affected row count for a non-query command.
    Affected(u64),
    /// Rows for a reader command.
    Rows(ResultSet),
    /// The command fails with `QueryFailed(message)`.
    Fail(String),
}

#[derive(Default)]
struct Shared {
    responses: Mutex<VecDeque<TestResponse>>,
    recorded: Mutex<Vec<RecordedCommand>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    open_failure: Mutex<Option<String>>,
}

impl Shared {
    fn record(&self, command: &DbCommand) {
        self.recorded.lock().push(RecordedCommand {
            text: command.text().to_string(),
            parameters: command.parameters().to_vec(),
        });
    }

    fn next_response(&self) -> Option<TestResponse> {
        self.responses.lock().pop_front()
    }
}

/// An in-memory database provider for testing.
///
/// Allows configuring expected responses and verifying executed commands
/// and connection usage. Every connection created by one provider shares
/// its response queue and counters.
///
/// # Example
/// ```
/// use dbsql::drivers::{InMemoryTestProvider, InMemoryTestResponseBuilder};
///
/// let provider = InMemoryTestProvider::new()
///     .with_affected(1)
///     .with_rows(
///         InMemoryTestResponseBuilder::new()
///             .columns(&["id", "name"])
///             .row(vec![1i64.into(), "Alice".into()])
///             .build(),
///     );
/// assert_eq!(provider.open_connections(), 0);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryTestProvider {
    shared: Arc<Shared>,
}

impl InMemoryTestProvider {
    /// Create a new in-memory test provider with no pre-configured responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response to be returned by the next command.
    /// Responses are returned in FIFO order.
    pub fn with_response(self, response: TestResponse) -> Self {
        self.shared.responses.lock().push_back(response);
        self
    }

    pub fn with_affected(self, rows: u64) -> Self {
        self.with_response(TestResponse::Affected(rows))
    }

    pub fn with_rows(self, result: ResultSet) -> Self {
        self.with_response(TestResponse::Rows(result))
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.with_response(TestResponse::Fail(message.into()))
    }

    /// Make every subsequent `open` fail with `ConnectionFailed(message)`.
    pub fn with_open_failure(self, message: impl Into<String>) -> Self {
        *self.shared.open_failure.lock() = Some(message.into());
        self
    }

    /// Get all recorded commands that have been executed.
    pub fn recorded_commands(&self) -> Vec<RecordedCommand> {
        self.shared.recorded.lock().clone()
    }

    /// Get the last recorded command, if any.
    pub fn last_command(&self) -> Option<RecordedCommand> {
        self.shared.recorded.lock().last().cloned()
    }

    pub fn opened_connections(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed_connections(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Connections opened and not closed yet.
    pub fn open_connections(&self) -> usize {
        self.opened_connections() - self.closed_connections()
    }

    /// Assert that the last command matches the expected text and parameter values.
    pub fn assert_last_command(&self, expected_text: &str, expected_values: &[SqlValue]) {
        let last = self.last_command().expect("No commands were recorded");
        assert_eq!(
            last.text, expected_text,
            "Command text mismatch.\nExpected: {}\nActual: {}",
            expected_text, last.text
        );
        let values: Vec<SqlValue> = last.parameters.iter().map(|p| p.value.clone()).collect();
        assert_eq!(
            values, expected_values,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_values, values
        );
    }

    /// Assert that exactly n commands were executed.
    pub fn assert_command_count(&self, expected: usize) {
        let actual = self.shared.recorded.lock().len();
        assert_eq!(
            actual, expected,
            "Command count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }
}

impl ProviderFactory for InMemoryTestProvider {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn create_connection(&self, _connection_string: &str) -> Result<Box<dyn DbConnection>> {
        Ok(Box::new(InMemoryTestConnection {
            shared: Arc::clone(&self.shared),
            state: ConnectionState::Created,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Created,
    Open,
    Closed,
}

/// Connection handed out by [`InMemoryTestProvider`].
pub struct InMemoryTestConnection {
    shared: Arc<Shared>,
    state: ConnectionState,
}

impl InMemoryTestConnection {
    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Created => Err(DbSqlError::ConnectionFailed(
                "connection is not open".to_string(),
            )),
            ConnectionState::Closed => Err(DbSqlError::ConnectionFailed(
                "connection is closed".to_string(),
            )),
        }
    }

    fn run_execute(&mut self, command: &DbCommand) -> Result<u64> {
        self.ensure_open()?;
        self.shared.record(command);
        match self.shared.next_response() {
            None => Ok(0),
            Some(TestResponse::Affected(rows)) => Ok(rows),
            Some(TestResponse::Rows(result)) => Ok(result.len() as u64),
            Some(TestResponse::Fail(message)) => Err(DbSqlError::QueryFailed(message)),
        }
    }

    fn run_reader(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>> {
        self.ensure_open()?;
        self.shared.record(command);
        match self.shared.next_response() {
            None | Some(TestResponse::Affected(_)) => {
                Ok(Box::new(BufferedReader::new(ResultSet::empty())))
            }
            Some(TestResponse::Rows(result)) => Ok(Box::new(BufferedReader::new(result))),
            Some(TestResponse::Fail(message)) => Err(DbSqlError::QueryFailed(message)),
        }
    }
}

#[async_trait]
impl DbConnection for InMemoryTestConnection {
    fn open(&mut self) -> Result<()> {
        if let Some(message) = self.shared.open_failure.lock().clone() {
            return Err(DbSqlError::ConnectionFailed(message));
        }
        if self.state != ConnectionState::Created {
            return Err(DbSqlError::ConnectionFailed(
                "connection was already opened".to_string(),
            ));
        }
        self.state = ConnectionState::Open;
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_async(&mut self) -> Result<()> {
        tokio::task::yield_now().await;
        self.open()
    }

    fn execute(&mut self, command: &DbCommand) -> Result<u64> {
        self.run_execute(command)
    }

    async fn execute_async(&mut self, command: &DbCommand) -> Result<u64> {
        tokio::task::yield_now().await;
        self.run_execute(command)
    }

    fn execute_reader(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>> {
        self.run_reader(command)
    }

    async fn execute_reader_async(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>> {
        tokio::task::yield_now().await;
        self.run_reader(command)
    }

    fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Open {
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }
}

/// Builder for creating test result sets easily.
#[derive(Default)]
pub struct InMemoryTestResponseBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl InMemoryTestResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a row of values in column order.
    pub fn row(mut self, values: Vec<SqlValue>) -> Self {
        self.rows.push(values);
        self
    }

    /// Build the ResultSet.
    pub fn build(self) -> ResultSet {
        ResultSet::new(self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_requires_open() {
        let provider = InMemoryTestProvider::new();
        let mut connection = provider.create_connection("").unwrap();
        let command = connection.create_command("SELECT 1");

        assert!(matches!(
            connection.execute(&command).unwrap_err(),
            DbSqlError::ConnectionFailed(_)
        ));
        provider.assert_command_count(0);
    }

    #[test]
    fn test_responses_are_fifo() {
        let provider = InMemoryTestProvider::new()
            .with_affected(2)
            .with_failure("duplicate key");
        let mut connection = provider.create_connection("").unwrap();
        connection.open().unwrap();
        let command = connection.create_command("DELETE FROM t");

        assert_eq!(connection.execute(&command).unwrap(), 2);
        assert!(matches!(
            connection.execute(&command).unwrap_err(),
            DbSqlError::QueryFailed(message) if message == "duplicate key"
        ));
        assert_eq!(connection.execute(&command).unwrap(), 0);
        provider.assert_command_count(3);
    }

    #[test]
    fn test_close_counts_once() {
        let provider = InMemoryTestProvider::new();
        let mut connection = provider.create_connection("").unwrap();
        connection.open().unwrap();
        assert_eq!(provider.open_connections(), 1);

        connection.close().unwrap();
        connection.close().unwrap();
        assert_eq!(provider.closed_connections(), 1);
        assert_eq!(provider.open_connections(), 0);
    }
}
