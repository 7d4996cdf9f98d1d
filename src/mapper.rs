use std::sync::Arc;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::{DbSqlError, Result};
use crate::schema::ShapeRegistry;
use crate::traits::{DataReader, Shape};
use crate::types::{FromSqlValue, ResultColumns, SqlValue};

/// Populates objects from the current row of a cursor.
#[derive(Clone)]
pub struct RowMapper {
    registry: Arc<ShapeRegistry>,
}

impl RowMapper {
    pub fn new(registry: Arc<ShapeRegistry>) -> Self {
        Self { registry }
    }

    /// Maps the current row onto `target` using the shape's inbound schema.
    ///
    /// Only fields whose column is present in the result are assigned; other
    /// fields keep their value.
    pub fn map<T: Shape>(&self, reader: &dyn DataReader, target: &mut T) -> Result<()> {
        let columns = ResultColumns::from_reader(reader)?;
        self.map_with_columns(reader, &columns, target)
    }

    /// Same as [`map`](Self::map) with column names read beforehand.
    pub fn map_with_columns<T: Shape>(
        &self,
        reader: &dyn DataReader,
        columns: &ResultColumns,
        target: &mut T,
    ) -> Result<()> {
        ensure_on_row(reader)?;
        let schema = self.registry.inbound::<T>()?;
        for mapping in schema.mappings() {
            if columns.contains(mapping.column()) {
                mapping.assign(target, reader.get_by_name(mapping.column())?)?;
            }
        }
        Ok(())
    }

    /// Reads the first column of the current row as a scalar.
    pub fn scalar<V: FromSqlValue>(&self, reader: &dyn DataReader) -> Result<V> {
        ensure_on_row(reader)?;
        V::from_sql_value(reader.get(0)?)
    }
}

fn ensure_on_row(reader: &dyn DataReader) -> Result<()> {
    if reader.on_row() {
        Ok(())
    } else {
        Err(DbSqlError::InvalidArgument(
            "reader is not positioned on a row".to_string(),
        ))
    }
}

/// A row of a result set: the cursor plus its column names.
pub struct CurrentRow<'a> {
    pub reader: &'a dyn DataReader,
    pub columns: &'a ResultColumns,
}

/// Types a query can return per row.
///
/// Every [`Shape`] is mapped through its inbound schema. Primitive types read
/// the first column directly without touching the schema cache, which is how
/// scalar queries like `SELECT COUNT(*)` are read.
pub trait FromRow: Sized + Send + 'static {
    /// Builds the row's value, starting from `seed` (a fresh instance per row).
    fn from_row(mapper: &RowMapper, row: &CurrentRow<'_>, seed: Self) -> Result<Self>;
}

impl<T: Shape> FromRow for T {
    fn from_row(mapper: &RowMapper, row: &CurrentRow<'_>, mut seed: Self) -> Result<Self> {
        mapper.map_with_columns(row.reader, row.columns, &mut seed)?;
        Ok(seed)
    }
}

macro_rules! impl_scalar_from_row {
    ($($ty:ty),*) => {
        $(
            impl FromRow for $ty {
                fn from_row(mapper: &RowMapper, row: &CurrentRow<'_>, _seed: Self) -> Result<Self> {
                    mapper.scalar(row.reader)
                }
            }

            impl FromRow for Option<$ty> {
                fn from_row(mapper: &RowMapper, row: &CurrentRow<'_>, _seed: Self) -> Result<Self> {
                    mapper.scalar(row.reader)
                }
            }
        )*
    };
}

impl_scalar_from_row!(bool, i16, i32, i64, f32, f64, String, Vec<u8>, Uuid, NaiveDateTime);

impl FromRow for SqlValue {
    fn from_row(mapper: &RowMapper, row: &CurrentRow<'_>, _seed: Self) -> Result<Self> {
        mapper.scalar(row.reader)
    }
}
