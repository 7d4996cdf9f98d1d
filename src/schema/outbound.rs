use std::fmt;

use crate::error::{DbSqlError, Result};
use crate::traits::{Getter, Shape};
use crate::types::{SqlType, SqlValue, TypeRegistry};

/// How one field is bound as a SQL parameter.
pub struct FieldBinding<T> {
    name: String,
    sql_type: SqlType,
    getter: Getter<T>,
}

impl<T> FieldBinding<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Reads the field's current value from `source`.
    pub fn value(&self, source: &T) -> SqlValue {
        (self.getter)(source)
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .finish()
    }
}

/// Parameter-binding schema of a shape, in field declaration order.
#[derive(Debug)]
pub struct OutboundSchema<T> {
    bindings: Vec<FieldBinding<T>>,
}

impl<T: Shape> OutboundSchema<T> {
    /// Introspects `T` and resolves every participating field's SQL type.
    pub fn build(types: &TypeRegistry) -> Result<Self> {
        let mut bindings = Vec::new();
        for field in T::fields() {
            if !field.is_parameter() {
                continue;
            }
            let sql_type =
                types
                    .lookup(field.value_type)
                    .ok_or(DbSqlError::UnsupportedFieldType {
                        shape: std::any::type_name::<T>(),
                        field: field.name,
                        type_name: field.value_type_name,
                    })?;
            let name = field.sql_parameter_name().to_string();
            if let Some(getter) = field.getter {
                bindings.push(FieldBinding {
                    name,
                    sql_type,
                    getter,
                });
            }
        }
        Ok(Self { bindings })
    }
}

impl<T> OutboundSchema<T> {
    pub fn bindings(&self) -> &[FieldBinding<T>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
