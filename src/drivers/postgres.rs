use async_trait::async_trait;
use tokio::runtime::Runtime;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};

use crate::drivers::placeholders::to_positional;
use crate::error::{DbSqlError, Result};
use crate::traits::{DataReader, DbConnection, ProviderFactory};
use crate::types::{BufferedReader, DbCommand, DbParameter, ResultSet, SqlType, SqlValue};

/// PostgreSQL provider using tokio-postgres.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProvider;

impl PostgresProvider {
    pub const NAME: &'static str = "postgres";
}

impl ProviderFactory for PostgresProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn DbConnection>> {
        Ok(Box::new(PostgresConnection::new(connection_string)))
    }
}

// The connection task runs on the connection's own runtime, so the client can
// be driven from blocking callers and from any async runtime alike.
enum Session {
    Closed,
    // Fields drop in order: the client first, then its runtime.
    Open {
        client: Client,
        runtime: SessionRuntime,
    },
}

/// Owns a connection's runtime and shuts it down without blocking when
/// dropped, which keeps dropping safe inside async contexts.
struct SessionRuntime(Option<Runtime>);

impl SessionRuntime {
    fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dbsql-postgres")
            .enable_all()
            .build()
            .map_err(|e| DbSqlError::ConnectionFailed(e.to_string()))?;
        Ok(Self(Some(runtime)))
    }

    fn handle(&self) -> Result<&Runtime> {
        self.0.as_ref().ok_or_else(|| {
            DbSqlError::ConnectionFailed("connection runtime was shut down".to_string())
        })
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// A PostgreSQL connection usable through both the blocking and async APIs.
///
/// The blocking methods fail with `ConnectionFailed` when called from inside
/// an async runtime; use the async methods there.
pub struct PostgresConnection {
    connection_string: String,
    session: Session,
}

impl PostgresConnection {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            session: Session::Closed,
        }
    }

    fn client(&self) -> Result<&Client> {
        match &self.session {
            Session::Open { client, .. } => Ok(client),
            Session::Closed => Err(DbSqlError::ConnectionFailed(
                "connection is not open".to_string(),
            )),
        }
    }

    fn blocking(&self) -> Result<(&Runtime, &Client)> {
        ensure_blocking_allowed()?;
        match &self.session {
            Session::Open { runtime, client } => Ok((runtime.handle()?, client)),
            Session::Closed => Err(DbSqlError::ConnectionFailed(
                "connection is not open".to_string(),
            )),
        }
    }
}

fn ensure_blocking_allowed() -> Result<()> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(DbSqlError::ConnectionFailed(
            "blocking call made from inside an async runtime; use the async API".to_string(),
        ));
    }
    Ok(())
}

// Connects and spawns the connection handler on the current runtime.
async fn connect(connection_string: String) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(&connection_string, NoTls)
        .await
        .map_err(|e| DbSqlError::ConnectionFailed(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "PostgreSQL connection error");
        }
    });
    Ok(client)
}

#[async_trait]
impl DbConnection for PostgresConnection {
    fn open(&mut self) -> Result<()> {
        ensure_blocking_allowed()?;
        let runtime = SessionRuntime::new()?;
        let client = runtime
            .handle()?
            .block_on(connect(self.connection_string.clone()))?;
        self.session = Session::Open { runtime, client };
        Ok(())
    }

    async fn open_async(&mut self) -> Result<()> {
        let runtime = SessionRuntime::new()?;
        let connecting = runtime
            .handle()?
            .spawn(connect(self.connection_string.clone()));
        let client = connecting
            .await
            .map_err(|e| DbSqlError::ConnectionFailed(e.to_string()))??;
        self.session = Session::Open { runtime, client };
        Ok(())
    }

    fn execute(&mut self, command: &DbCommand) -> Result<u64> {
        let (runtime, client) = self.blocking()?;
        runtime.block_on(execute_on(client, command))
    }

    async fn execute_async(&mut self, command: &DbCommand) -> Result<u64> {
        let client = self.client()?;
        execute_on(client, command).await
    }

    fn execute_reader(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>> {
        let (runtime, client) = self.blocking()?;
        let result = runtime.block_on(query_on(client, command))?;
        Ok(Box::new(BufferedReader::new(result)))
    }

    async fn execute_reader_async(&mut self, command: &DbCommand) -> Result<Box<dyn DataReader>> {
        let client = self.client()?;
        let result = query_on(client, command).await?;
        Ok(Box::new(BufferedReader::new(result)))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the session drops the client, then shuts the runtime down.
        self.session = Session::Closed;
        Ok(())
    }
}

async fn execute_on(client: &Client, command: &DbCommand) -> Result<u64> {
    let (sql, parameters) = to_positional(command.text(), command.parameters())?;
    let converted = convert_parameters(&parameters);
    let param_refs = parameter_refs(&converted);

    client
        .execute(sql.as_str(), &param_refs)
        .await
        .map_err(|e| DbSqlError::QueryFailed(e.to_string()))
}

async fn query_on(client: &Client, command: &DbCommand) -> Result<ResultSet> {
    let (sql, parameters) = to_positional(command.text(), command.parameters())?;
    let converted = convert_parameters(&parameters);
    let param_refs = parameter_refs(&converted);

    // Prepare first so column names are known even when no rows come back.
    let statement = client
        .prepare(&sql)
        .await
        .map_err(|e| DbSqlError::QueryFailed(e.to_string()))?;
    let rows = client
        .query(&statement, &param_refs)
        .await
        .map_err(|e| DbSqlError::QueryFailed(e.to_string()))?;

    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let result_rows = rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .enumerate()
                .map(|(i, col)| row_value(row, i, col.type_()))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResultSet::new(columns, result_rows))
}

fn convert_parameters(parameters: &[&DbParameter]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    parameters
        .iter()
        .map(|p| sql_value_to_tosql(&p.value, p.sql_type))
        .collect()
}

fn parameter_refs(converted: &[Box<dyn ToSql + Sync + Send>]) -> Vec<&(dyn ToSql + Sync)> {
    converted
        .iter()
        .map(|b| b.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Convert a SqlValue to a boxed ToSql trait object.
/// NULL is typed after the parameter's declared SQL type so the server accepts it.
fn sql_value_to_tosql(value: &SqlValue, sql_type: SqlType) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null => typed_null(sql_type),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Int16(i) => Box::new(*i),
        SqlValue::Int32(i) => Box::new(*i),
        SqlValue::Int64(i) => Box::new(*i),
        SqlValue::Float32(f) => Box::new(*f),
        SqlValue::Float64(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Bytes(b) => Box::new(b.clone()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::Timestamp(t) => Box::new(*t),
    }
}

fn typed_null(sql_type: SqlType) -> Box<dyn ToSql + Sync + Send> {
    match sql_type {
        SqlType::Boolean => Box::new(None::<bool>),
        SqlType::Int16 => Box::new(None::<i16>),
        SqlType::Int32 => Box::new(None::<i32>),
        SqlType::Int64 => Box::new(None::<i64>),
        SqlType::Float32 => Box::new(None::<f32>),
        SqlType::Float64 => Box::new(None::<f64>),
        SqlType::String => Box::new(None::<String>),
        SqlType::Binary => Box::new(None::<Vec<u8>>),
        SqlType::Guid => Box::new(None::<uuid::Uuid>),
        SqlType::DateTime => Box::new(None::<chrono::NaiveDateTime>),
    }
}

/// Raw wire bytes of a column, accepted for every Postgres type.
struct RawColumn<'a>(Option<&'a [u8]>);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawColumn(Some(raw)))
    }

    fn from_sql_null(
        _: &Type,
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawColumn(None))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn row_value(row: &Row, index: usize, type_: &Type) -> Result<SqlValue> {
    let raw = row
        .try_get::<_, RawColumn>(index)
        .map_err(|e| DbSqlError::QueryFailed(e.to_string()))?;
    column_value(type_, raw.0)
}

/// Converts a column's binary wire value to a SqlValue.
///
/// Types without a dedicated variant are kept as their raw bytes, so a row
/// with such a column still reads; only mapping that column onto a typed field
/// fails.
fn column_value(type_: &Type, raw: Option<&[u8]>) -> Result<SqlValue> {
    fn decode<'a, T: FromSql<'a>>(type_: &Type, raw: &'a [u8]) -> Result<T> {
        T::from_sql(type_, raw).map_err(|e| DbSqlError::QueryFailed(e.to_string()))
    }

    let Some(raw) = raw else {
        return Ok(SqlValue::Null);
    };

    let value = if *type_ == Type::BOOL {
        SqlValue::Bool(decode(type_, raw)?)
    } else if *type_ == Type::CHAR {
        SqlValue::Int16(i16::from(decode::<i8>(type_, raw)?))
    } else if *type_ == Type::INT2 {
        SqlValue::Int16(decode(type_, raw)?)
    } else if *type_ == Type::INT4 {
        SqlValue::Int32(decode(type_, raw)?)
    } else if *type_ == Type::INT8 {
        SqlValue::Int64(decode(type_, raw)?)
    } else if *type_ == Type::OID {
        SqlValue::Int64(i64::from(decode::<u32>(type_, raw)?))
    } else if *type_ == Type::FLOAT4 {
        SqlValue::Float32(decode(type_, raw)?)
    } else if *type_ == Type::FLOAT8 {
        SqlValue::Float64(decode(type_, raw)?)
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::JSON].contains(type_) {
        SqlValue::Text(decode(&Type::TEXT, raw)?)
    } else if *type_ == Type::JSONB {
        // Binary jsonb is a version byte followed by the JSON text.
        match raw.split_first() {
            Some((&1, text)) => SqlValue::Text(decode(&Type::TEXT, text)?),
            _ => SqlValue::Bytes(raw.to_vec()),
        }
    } else if *type_ == Type::BYTEA {
        SqlValue::Bytes(decode(type_, raw)?)
    } else if *type_ == Type::UUID {
        SqlValue::Uuid(decode(type_, raw)?)
    } else if *type_ == Type::TIMESTAMP {
        SqlValue::Timestamp(decode(type_, raw)?)
    } else if *type_ == Type::TIMESTAMPTZ {
        SqlValue::Timestamp(decode::<chrono::DateTime<chrono::Utc>>(type_, raw)?.naive_utc())
    } else if *type_ == Type::DATE {
        let date: chrono::NaiveDate = decode(type_, raw)?;
        SqlValue::Timestamp(date.and_time(chrono::NaiveTime::default()))
    } else {
        SqlValue::Bytes(raw.to_vec())
    };

    Ok(value)
}
