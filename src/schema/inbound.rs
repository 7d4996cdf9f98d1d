use std::fmt;

use crate::error::Result;
use crate::traits::{Setter, Shape};
use crate::types::SqlValue;

/// How one field is populated from a result column.
pub struct FieldMapping<T> {
    column: String,
    setter: Setter<T>,
}

impl<T> FieldMapping<T> {
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Assigns a cursor value to the field on `target`.
    pub fn assign(&self, target: &mut T, value: SqlValue) -> Result<()> {
        (self.setter)(target, value)
    }
}

impl<T> fmt::Debug for FieldMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("column", &self.column)
            .finish()
    }
}

/// Row-mapping schema of a shape, in field declaration order.
#[derive(Debug)]
pub struct InboundSchema<T> {
    mappings: Vec<FieldMapping<T>>,
}

impl<T: Shape> InboundSchema<T> {
    pub fn build() -> Self {
        let mappings = T::fields()
            .into_iter()
            .filter(|field| field.is_column())
            .filter_map(|field| {
                let column = field.sql_column_name().to_string();
                field.setter.map(|setter| FieldMapping { column, setter })
            })
            .collect();
        Self { mappings }
    }
}

impl<T> InboundSchema<T> {
    pub fn mappings(&self) -> &[FieldMapping<T>] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
