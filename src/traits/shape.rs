use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{FromSqlValue, SqlValue};

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> SqlValue + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, SqlValue) -> Result<()> + Send + Sync>;

/// Trait for plain data types that bind to SQL parameters and map from rows.
///
/// `fields` is the only introspection point: it is called once per shape
/// and direction, the result is cached by the [`ShapeRegistry`](crate::schema::ShapeRegistry).
///
/// # Example
/// ```
/// use dbsql::traits::{FieldDescriptor, Shape};
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
///     cached_score: f64,
/// }
///
/// impl Shape for User {
///     fn fields() -> Vec<FieldDescriptor<Self>> {
///         vec![
///             FieldDescriptor::new("id", |u: &User| &u.id, |u: &mut User| &mut u.id),
///             FieldDescriptor::new("Name", |u: &User| &u.name, |u: &mut User| &mut u.name)
///                 .rename("name"),
///             FieldDescriptor::new(
///                 "cached_score",
///                 |u: &User| &u.cached_score,
///                 |u: &mut User| &mut u.cached_score,
///             )
///             .skip_parameter()
///             .skip_column(),
///         ]
///     }
/// }
/// ```
pub trait Shape: Send + Sync + 'static {
    fn fields() -> Vec<FieldDescriptor<Self>>
    where
        Self: Sized;
}

/// Describes one field of a [`Shape`]: its names, participation flags
/// and how to read and write it.
pub struct FieldDescriptor<T> {
    pub(crate) name: &'static str,
    pub(crate) parameter_name: Option<String>,
    pub(crate) column_name: Option<String>,
    pub(crate) value_type: TypeId,
    pub(crate) value_type_name: &'static str,
    pub(crate) bind: bool,
    pub(crate) map: bool,
    pub(crate) getter: Option<Getter<T>>,
    pub(crate) setter: Option<Setter<T>>,
}

impl<T: 'static> FieldDescriptor<T> {
    /// A field that is both bound as a parameter and mapped from a column.
    pub fn new<V>(name: &'static str, get: fn(&T) -> &V, set: fn(&mut T) -> &mut V) -> Self
    where
        V: Clone + Into<SqlValue> + FromSqlValue + 'static,
    {
        let mut field = Self::read_only(name, get);
        field.setter = Some(Arc::new(move |target: &mut T, value: SqlValue| {
            *set(target) = V::from_sql_value(value)?;
            Ok(())
        }));
        field.map = true;
        field
    }

    /// A field that is only bound as a parameter.
    pub fn read_only<V>(name: &'static str, get: fn(&T) -> &V) -> Self
    where
        V: Clone + Into<SqlValue> + 'static,
    {
        Self {
            name,
            parameter_name: None,
            column_name: None,
            value_type: TypeId::of::<V>(),
            value_type_name: std::any::type_name::<V>(),
            bind: true,
            map: false,
            getter: Some(Arc::new(move |source: &T| get(source).clone().into())),
            setter: None,
        }
    }

    /// A field that is only mapped from a column.
    pub fn write_only<V>(name: &'static str, set: fn(&mut T) -> &mut V) -> Self
    where
        V: FromSqlValue + 'static,
    {
        Self {
            name,
            parameter_name: None,
            column_name: None,
            value_type: TypeId::of::<V>(),
            value_type_name: std::any::type_name::<V>(),
            bind: false,
            map: true,
            getter: None,
            setter: Some(Arc::new(move |target: &mut T, value: SqlValue| {
                *set(target) = V::from_sql_value(value)?;
                Ok(())
            })),
        }
    }

    /// Overrides the SQL name in both directions.
    pub fn rename(self, sql_name: impl Into<String>) -> Self {
        let sql_name = sql_name.into();
        self.parameter_name(sql_name.clone()).column_name(sql_name)
    }

    pub fn parameter_name(mut self, name: impl Into<String>) -> Self {
        self.parameter_name = Some(name.into());
        self
    }

    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    /// Excludes the field from parameter binding.
    pub fn skip_parameter(mut self) -> Self {
        self.bind = false;
        self
    }

    /// Excludes the field from row mapping.
    pub fn skip_column(mut self) -> Self {
        self.map = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn sql_parameter_name(&self) -> &str {
        self.parameter_name.as_deref().unwrap_or(self.name)
    }

    pub fn sql_column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(self.name)
    }

    pub fn is_parameter(&self) -> bool {
        self.bind && self.getter.is_some()
    }

    pub fn is_column(&self) -> bool {
        self.map && self.setter.is_some()
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("parameter_name", &self.parameter_name)
            .field("column_name", &self.column_name)
            .field("value_type", &self.value_type_name)
            .field("bind", &self.bind)
            .field("map", &self.map)
            .finish()
    }
}
